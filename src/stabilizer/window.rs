use crate::gesture::Gesture;
use std::collections::VecDeque;

/// The last K observations; `None` marks a frame without an accepted gesture
#[derive(Debug, Clone)]
pub struct VoteWindow {
    slots: VecDeque<Option<Gesture>>,
    capacity: usize,
}

impl VoteWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, observation: Option<Gesture>) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(observation);
    }

    pub fn votes(&self, gesture: Gesture) -> usize {
        self.slots.iter().filter(|s| **s == Some(gesture)).count()
    }

    /// Gesture with the most votes, ties going to the most recently seen
    pub fn leader(&self) -> Option<(Gesture, usize)> {
        let mut best: Option<(Gesture, usize)> = None;
        for gesture in self.slots.iter().rev().flatten() {
            if best.map(|(g, _)| g == *gesture).unwrap_or(false) {
                continue;
            }
            let votes = self.votes(*gesture);
            match best {
                Some((_, best_votes)) if best_votes >= votes => {}
                _ => best = Some((*gesture, votes)),
            }
        }
        best
    }

    /// The leading gesture if it holds at least `min_votes`
    pub fn stable(&self, min_votes: usize) -> Option<Gesture> {
        self.leader()
            .filter(|(_, votes)| *votes >= min_votes)
            .map(|(gesture, _)| gesture)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = VoteWindow::new(3);
        window.push(Some(Gesture::Victory));
        window.push(Some(Gesture::Victory));
        window.push(None);
        window.push(Some(Gesture::ThumbUp));

        assert_eq!(window.len(), 3);
        assert_eq!(window.votes(Gesture::Victory), 1);
        assert_eq!(window.votes(Gesture::ThumbUp), 1);
    }

    #[test]
    fn test_leader_prefers_recent_on_tie() {
        let mut window = VoteWindow::new(4);
        window.push(Some(Gesture::OpenPalm));
        window.push(Some(Gesture::ClosedFist));
        assert_eq!(window.leader(), Some((Gesture::ClosedFist, 1)));

        window.push(Some(Gesture::OpenPalm));
        assert_eq!(window.leader(), Some((Gesture::OpenPalm, 2)));
        assert_eq!(window.stable(3), None);
        assert_eq!(window.stable(2), Some(Gesture::OpenPalm));
    }

    #[test]
    fn test_empty_window_has_no_leader() {
        let mut window = VoteWindow::new(2);
        assert_eq!(window.leader(), None);
        window.push(None);
        window.push(None);
        assert_eq!(window.leader(), None);
    }
}
