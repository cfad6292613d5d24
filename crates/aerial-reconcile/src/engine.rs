use std::collections::BTreeSet;

use crate::Movement;

fn has_present_successor<T: Ord>(stops: &[T], s_i: usize, new: &BTreeSet<T>) -> bool {
    stops[s_i + 1..].iter().any(|n| new.contains(n))
}

/// Infer movements from a presence transition along one route.
///
/// `stops` is the canonical order of the route. The walk goes from the last
/// stop to the first, keeping a cursor `o_i` into the still unconsumed prefix
/// of `stops`:
/// - a stop that is no longer present is a departure unless some later stop
///   is present (the vehicle moved on, and that later stop explains it);
/// - a present stop pairs with the nearest earlier previously present stop
///   in the unconsumed prefix, or entered the route when there is none.
///
/// Ties between several vehicles resolve by this scan order alone. The
/// result is in emission order.
pub fn plan_movements<T: Ord + Clone>(
    stops: &[T],
    old: &BTreeSet<T>,
    new: &BTreeSet<T>,
) -> Vec<Movement<T>> {
    let mut out = Vec::new();
    let mut o_i = stops.len();

    for s_i in (0..stops.len()).rev() {
        let s = &stops[s_i];

        if !new.contains(s) {
            if o_i > s_i {
                o_i -= 1;
            }
            if old.contains(s) && !has_present_successor(stops, s_i, new) {
                out.push(Movement::Left { origin: s.clone() });
            }
            continue;
        }

        let mut paired = false;
        while o_i > 0 {
            o_i -= 1;
            let o = &stops[o_i];
            if old.contains(o) {
                if o != s {
                    out.push(Movement::Moved {
                        origin: o.clone(),
                        destination: s.clone(),
                    });
                }
                paired = true;
                break;
            }
        }
        if !paired {
            out.push(Movement::Entered {
                destination: s.clone(),
            });
        }
    }

    out
}
