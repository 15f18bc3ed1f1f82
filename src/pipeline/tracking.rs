use crate::types::{Body, BodyFrame, TrackingId};

/// The face-tracking side of the coordinator: something that holds at most one tracking id
/// and decides on its own when that id stops being valid.
pub trait FaceTrackingTarget {
    fn is_tracking_id_valid(&self) -> bool;
    fn set_tracking_id(&mut self, id: TrackingId);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceSlot {
    Unassigned,
    Assigned(TrackingId),
}

/// Latches the first tracked body onto the face source and leaves it there until the
/// source drops it.
#[derive(Debug)]
pub struct FaceTrackingCoordinator {
    bodies: Vec<Body>,
    slot: FaceSlot,
}

impl FaceTrackingCoordinator {
    pub fn new(body_count: usize) -> Self {
        Self {
            bodies: vec![Body::default(); body_count],
            slot: FaceSlot::Unassigned,
        }
    }

    pub fn slot(&self) -> FaceSlot {
        self.slot
    }

    pub fn tracked_body_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_tracked).count()
    }

    /// Handles one body frame. Returns the id when it was newly attached to `target`.
    pub fn on_body_frame<T: FaceTrackingTarget>(
        &mut self,
        frame: &BodyFrame,
        target: &mut T,
    ) -> Option<TrackingId> {
        frame.refresh_body_data(&mut self.bodies);

        if let FaceSlot::Assigned(id) = self.slot {
            if target.is_tracking_id_valid() {
                return None;
            }
            log::info!("face tracking id {} was released", id.0);
            self.slot = FaceSlot::Unassigned;
        } else if target.is_tracking_id_valid() {
            // Valid id attached by someone else; nothing to latch.
            return None;
        }

        let body = self.bodies.iter().find(|b| b.is_tracked)?;
        let id = body.tracking_id;
        target.set_tracking_id(id);
        self.slot = FaceSlot::Assigned(id);
        log::info!("face tracking attached to body {}", id.0);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[derive(Default)]
    struct FakeTarget {
        id: Option<TrackingId>,
        assignments: usize,
    }

    impl FakeTarget {
        fn invalidate(&mut self) {
            self.id = None;
        }
    }

    impl FaceTrackingTarget for FakeTarget {
        fn is_tracking_id_valid(&self) -> bool {
            self.id.is_some()
        }

        fn set_tracking_id(&mut self, id: TrackingId) {
            self.id = Some(id);
            self.assignments += 1;
        }
    }

    fn frame(bodies: &[(bool, u64)]) -> BodyFrame {
        BodyFrame {
            bodies: bodies
                .iter()
                .map(|&(is_tracked, id)| Body {
                    is_tracked,
                    tracking_id: TrackingId(id),
                })
                .collect(),
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn untracked_bodies_never_assign() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        for _ in 0..5 {
            let untracked = frame(&[(false, 1), (false, 2)]);
            assert_eq!(coordinator.on_body_frame(&untracked, &mut target), None);
        }

        assert_eq!(target.assignments, 0);
        assert_eq!(coordinator.slot(), FaceSlot::Unassigned);
    }

    #[test]
    fn single_tracked_body_assigns_once() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        let assigned = coordinator.on_body_frame(&frame(&[(false, 1), (true, 42)]), &mut target);
        assert_eq!(assigned, Some(TrackingId(42)));

        coordinator.on_body_frame(&frame(&[(false, 1), (true, 42)]), &mut target);
        coordinator.on_body_frame(&frame(&[(true, 7), (true, 42)]), &mut target);

        assert_eq!(target.assignments, 1);
        assert_eq!(target.id, Some(TrackingId(42)));
        assert_eq!(coordinator.slot(), FaceSlot::Assigned(TrackingId(42)));
    }

    #[test]
    fn first_tracked_body_wins() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        let assigned =
            coordinator.on_body_frame(&frame(&[(false, 1), (true, 5), (true, 3)]), &mut target);

        assert_eq!(assigned, Some(TrackingId(5)));
    }

    #[test]
    fn reassigns_after_source_drops_the_id() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        coordinator.on_body_frame(&frame(&[(true, 1)]), &mut target);
        target.invalidate();

        let assigned = coordinator.on_body_frame(&frame(&[(true, 2)]), &mut target);

        assert_eq!(assigned, Some(TrackingId(2)));
        assert_eq!(target.assignments, 2);
    }

    #[test]
    fn invalidated_slot_waits_for_a_tracked_body() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        coordinator.on_body_frame(&frame(&[(true, 1)]), &mut target);
        target.invalidate();
        coordinator.on_body_frame(&frame(&[(false, 1)]), &mut target);

        assert_eq!(coordinator.slot(), FaceSlot::Unassigned);
        assert_eq!(target.id, None);
    }

    #[test]
    fn body_array_keeps_sensor_capacity() {
        let mut coordinator = FaceTrackingCoordinator::new(6);
        let mut target = FakeTarget::default();

        coordinator.on_body_frame(&frame(&[(true, 1), (true, 2)]), &mut target);
        assert_eq!(coordinator.bodies.len(), 6);
        assert_eq!(coordinator.tracked_body_count(), 2);

        coordinator.on_body_frame(&frame(&[]), &mut target);
        assert_eq!(coordinator.tracked_body_count(), 0);
    }
}
