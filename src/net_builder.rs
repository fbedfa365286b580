//! Demonstration of an external net-builder collaborator.
//!
//! Not part of [`crate::discover::run`]'s return value — the core emits a
//! `HashSet<Place>`, and it is an external collaborator's job to attach a
//! source/sink and wire up transitions. This module shows what that
//! collaborator looks like, built over
//! `petri_net::petri_net_struct::{PetriNet, Place, Transition, Arc, ArcType,
//! Marking}` (`Uuid`-keyed nodes, `HashMap` markings), trimmed to
//! construction only — no PNML import/export or graphviz rendering.

use std::collections::HashMap;

use crate::log::{ActivityMask, EncodedLog};
use crate::petri_net::petri_net_struct::{ArcType, Marking, PetriNet, PlaceID, TransitionID};
use crate::place::Place as CandidatePlace;

fn bits(mut set: ActivityMask) -> impl Iterator<Item = ActivityMask> {
    std::iter::from_fn(move || {
        if set == 0 {
            None
        } else {
            let bit = set & set.wrapping_neg();
            set &= set - 1;
            Some(bit)
        }
    })
}

/// Builds a [`PetriNet`] from a discovered place set: one transition per
/// activity (the injected `START`/`END` activities become invisible
/// transitions), a source with one initial token feeding the
/// `START` transition, a sink consuming one token from the `END`
/// transition, and one net place per discovered `(I, O)` pair with arcs
/// from every activity in `I` and to every activity in `O`.
pub fn build_petri_net(places: &std::collections::HashSet<CandidatePlace>, log: &EncodedLog) -> PetriNet {
    let mut net = PetriNet::new();

    let mut transitions: HashMap<ActivityMask, TransitionID> = HashMap::new();
    for (idx, label) in log.activities.iter().enumerate() {
        let mask: ActivityMask = 1u64 << idx;
        let is_synthetic = mask == log.start_mask || mask == log.end_mask;
        let transition_label = if is_synthetic { None } else { Some(label.clone()) };
        let transition = net.add_transition(transition_label, None);
        transitions.insert(mask, transition);
    }

    let source: PlaceID = net.add_place(None);
    let sink: PlaceID = net.add_place(None);
    net.add_arc(ArcType::place_to_transition(source, transitions[&log.start_mask]), None);
    net.add_arc(ArcType::transition_to_place(transitions[&log.end_mask], sink), None);

    for place in places {
        let net_place = net.add_place(None);
        for activity in bits(place.input) {
            if let Some(&transition) = transitions.get(&activity) {
                net.add_arc(ArcType::transition_to_place(transition, net_place), None);
            }
        }
        for activity in bits(place.output) {
            if let Some(&transition) = transitions.get(&activity) {
                net.add_arc(ArcType::place_to_transition(net_place, transition), None);
            }
        }
    }

    let mut initial_marking: Marking = HashMap::new();
    initial_marking.insert(source, 1);
    net.initial_marking = Some(initial_marking);

    let mut final_marking: Marking = HashMap::new();
    final_marking.insert(sink, 1);
    net.final_markings = Some(vec![final_marking]);

    net
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::encode_log;

    #[test]
    fn builds_a_net_with_source_sink_and_one_place_per_candidate() {
        let log = encode_log(&[vec!["a".to_string(), "b".to_string()]]).unwrap();
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();

        let mut places = std::collections::HashSet::new();
        places.insert(CandidatePlace::new(log.start_mask, a));
        places.insert(CandidatePlace::new(a, b));
        places.insert(CandidatePlace::new(b, log.end_mask));

        let net = build_petri_net(&places, &log);
        // source + sink + 3 discovered places.
        assert_eq!(net.places.len(), 5);
        // one transition per distinct activity, including START/END.
        assert_eq!(net.transitions.len(), log.activities.len());
        assert_eq!(net.initial_marking.as_ref().unwrap().values().sum::<u64>(), 1);
        assert_eq!(net.final_markings.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn start_and_end_transitions_are_invisible() {
        let log = encode_log(&[vec!["a".to_string()]]).unwrap();
        let net = build_petri_net(&std::collections::HashSet::new(), &log);
        let invisible_count = net.transitions.values().filter(|t| t.label.is_none()).count();
        assert_eq!(invisible_count, 2);
    }
}
