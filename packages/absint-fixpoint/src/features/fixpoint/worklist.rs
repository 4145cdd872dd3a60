/*
 * Worklist: the scheduler of the fixpoint iteration
 *
 * A queue of pending program points with a pluggable ordering policy, chosen
 * once at construction:
 *
 * - GlobalOrder: a priority queue over the natural order of the elements
 *   (address first, then context). Re-enqueuing a pending element is a
 *   no-op. Lower addresses are favored, which tends to stabilize inner
 *   loops before propagating state to outer control flow.
 * - Stack: a LIFO deque. Re-enqueuing a pending element moves it to the
 *   top, approximating "process the most recently produced successor next",
 *   which improves convergence speed on typical loop structures.
 *
 * Elements are never duplicated: membership is tracked in a side set and
 * dequeuing always removes the element from it.
 */

use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::hash::Hash;

use crate::config::WorklistOrder;

enum Queue<T: Ord> {
    GlobalOrder(BinaryHeap<Reverse<T>>),
    Stack(VecDeque<T>),
}

/// The pending-work queue driving the fixpoint loop.
pub struct Worklist<T: Ord + Hash + Clone> {
    queue: Queue<T>,
    pending: FxHashSet<T>,
}

impl<T: Ord + Hash + Clone> Worklist<T> {
    pub fn new(order: WorklistOrder) -> Self {
        let queue = match order {
            WorklistOrder::GlobalOrder => Queue::GlobalOrder(BinaryHeap::new()),
            WorklistOrder::Stack => Queue::Stack(VecDeque::new()),
        };
        Self {
            queue,
            pending: FxHashSet::default(),
        }
    }

    /// Add an element to the worklist. An element that is already pending is
    /// not duplicated: under global order the call is a no-op, under the
    /// stack policy the element moves to the top.
    pub fn enqueue(&mut self, element: T) {
        match &mut self.queue {
            Queue::GlobalOrder(heap) => {
                if self.pending.insert(element.clone()) {
                    heap.push(Reverse(element));
                }
            }
            Queue::Stack(deque) => {
                if !self.pending.insert(element.clone()) {
                    let position = deque
                        .iter()
                        .position(|pending| *pending == element)
                        .expect("pending element must be queued");
                    deque.remove(position);
                }
                deque.push_front(element);
            }
        }
    }

    /// Remove and return the next element according to the ordering policy.
    ///
    /// # Panics
    /// If the worklist is empty. Callers must check [`Self::is_empty`]
    /// first; dequeuing from an empty worklist is a driver-loop bug.
    pub fn dequeue(&mut self) -> T {
        let element = match &mut self.queue {
            Queue::GlobalOrder(heap) => heap.pop().map(|Reverse(element)| element),
            Queue::Stack(deque) => deque.pop_front(),
        }
        .expect("dequeue on an empty worklist");
        self.pending.remove(&element);
        element
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether an element is currently queued
    pub fn contains(&self, element: &T) -> bool {
        self.pending.contains(element)
    }
}

impl<T: Ord + Hash + Clone + fmt::Display> fmt::Display for Worklist<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worklist[{} pending]", self.len())
    }
}
