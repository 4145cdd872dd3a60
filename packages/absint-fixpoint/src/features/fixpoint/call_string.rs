/*
 * Call strings: bounded interprocedural context
 *
 * A call string is the sequence of call transitions that describes the path
 * on which a procedure was reached. Context sensitivity is bounded by a
 * length k: only the last k calls are significant for identifying a context,
 * older calls are demoted into a backlog that exists purely for size
 * bookkeeping. Two call strings with the same significant tail are the same
 * analysis context even if their deeper history differs; that approximation
 * is exactly what keeps the number of contexts finite.
 *
 * Call strings are persistent values: push and pop return new strings that
 * share structure with their predecessor (Arc cons lists, newest-first).
 * The hot operations push/pop are O(1); demoting into or promoting out of
 * the backlog rebuilds the significant list once, O(k).
 *
 * Reference:
 * - Sharir & Pnueli (1981). "Two Approaches to Interprocedural Data Flow
 *   Analysis" (the call-strings approach)
 */

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::shared::models::Transition;

/// Persistent cons list of transitions, newest first
type Link = Option<Arc<Node>>;

#[derive(Debug)]
struct Node {
    transition: Transition,
    rest: Link,
}

fn cons(transition: Transition, rest: &Link) -> Link {
    Some(Arc::new(Node {
        transition,
        rest: rest.clone(),
    }))
}

/// Transitions of a list in stored (newest-first) order
fn collect(list: &Link) -> Vec<Transition> {
    let mut out = Vec::new();
    let mut cursor = list;
    while let Some(node) = cursor {
        out.push(node.transition);
        cursor = &node.rest;
    }
    out
}

/// Rebuild a list from newest-first transitions
fn rebuild(newest_first: &[Transition]) -> Link {
    let mut list = None;
    for &transition in newest_first.iter().rev() {
        list = cons(transition, &list);
    }
    list
}

/// A bounded sequence of call transitions identifying the interprocedural
/// context of a program point.
///
/// Logically immutable: all mutating operations return a new `CallString`.
/// Equality and hashing depend only on the significant sequence and the
/// bound `k`, never on the backlog.
#[derive(Debug, Clone)]
pub struct CallString {
    /// Most recent k transitions, newest first
    significant: Link,
    significant_len: usize,
    /// Transitions evicted from the significant sequence, newest-evicted
    /// first. With `k = 0` all transitions land here.
    backlog: Link,
    backlog_len: usize,
    /// Bound on the significant sequence; 0 means backlog-only mode
    max_significant: usize,
}

impl CallString {
    /// Default bound on the significant sequence
    pub const DEFAULT_LENGTH: usize = 50;

    /// Empty context at the program entry, bounded by `k`. `k = 0`
    /// degenerates to the unbounded backlog-only mode.
    pub fn root(k: usize) -> Self {
        Self {
            significant: None,
            significant_len: 0,
            backlog: None,
            backlog_len: 0,
            max_significant: k,
        }
    }

    /// Empty context with the default bound
    pub fn root_default() -> Self {
        Self::root(Self::DEFAULT_LENGTH)
    }

    /// Append `transition` as the new most-recent call. If the significant
    /// sequence is full its oldest entry is demoted into the backlog first,
    /// so the significant length never exceeds `k`.
    pub fn push(&self, transition: Transition) -> Self {
        let mut next = self.clone();
        if self.max_significant == 0 {
            next.backlog = cons(transition, &self.backlog);
            next.backlog_len += 1;
            return next;
        }
        if self.significant_len == self.max_significant {
            let mut newest_first = collect(&self.significant);
            let oldest = newest_first.pop().expect("full significant sequence");
            next.significant = rebuild(&newest_first);
            next.significant_len -= 1;
            next.backlog = cons(oldest, &self.backlog);
            next.backlog_len += 1;
        }
        next.significant = cons(transition, &next.significant);
        next.significant_len += 1;
        next
    }

    /// Remove the most recent transition, checking that it equals
    /// `transition`. The check lets an interprocedural return verify that it
    /// unwinds the same call it thinks it does.
    ///
    /// # Panics
    /// If the string is empty or the most recent transition differs from
    /// `transition` — both are programming errors in the engine wiring or a
    /// collaborating domain, not recoverable analysis outcomes.
    pub fn pop(&self, transition: Transition) -> Self {
        let (next, popped) = self.pop_inner();
        assert!(
            popped == transition,
            "call-string pop mismatch: expected to unwind {transition} but the \
             most recent call is {popped} (context {self})",
        );
        next
    }

    /// Remove the most recent transition without checking which call it
    /// belongs to. Used when the analysis returns to an unknown or merged
    /// caller context.
    ///
    /// # Panics
    /// If the string is empty.
    pub fn unsafe_pop(&self) -> Self {
        self.pop_inner().0
    }

    fn pop_inner(&self) -> (Self, Transition) {
        assert!(self.size() > 0, "pop on the root call string");
        let mut next = self.clone();
        if self.max_significant == 0 {
            let node = self.backlog.as_ref().expect("non-empty backlog");
            next.backlog = node.rest.clone();
            next.backlog_len -= 1;
            return (next, node.transition);
        }
        let node = self.significant.as_ref().expect("non-empty significant");
        let popped = node.transition;
        next.significant = node.rest.clone();
        next.significant_len -= 1;
        if let Some(evicted) = self.backlog.as_ref() {
            // the most recently demoted call becomes significant again
            debug_assert_eq!(self.significant_len, self.max_significant);
            let mut newest_first = collect(&next.significant);
            newest_first.push(evicted.transition);
            next.significant = rebuild(&newest_first);
            next.significant_len += 1;
            next.backlog = evicted.rest.clone();
            next.backlog_len -= 1;
        }
        (next, popped)
    }

    /// The most recent significant transition, if any
    pub fn peek(&self) -> Option<Transition> {
        self.significant.as_ref().map(|node| node.transition)
    }

    /// Total number of transitions, significant and backlog
    pub fn size(&self) -> usize {
        self.significant_len + self.backlog_len
    }

    pub fn is_root(&self) -> bool {
        self.size() == 0
    }

    /// The significant transitions, oldest first
    pub fn significant_transitions(&self) -> Vec<Transition> {
        let mut oldest_first = collect(&self.significant);
        oldest_first.reverse();
        oldest_first
    }

    /// All transitions including the backlog, oldest first
    pub fn all_transitions(&self) -> Vec<Transition> {
        let mut oldest_first = collect(&self.backlog);
        oldest_first.reverse();
        oldest_first.extend(self.significant_transitions());
        oldest_first
    }

    /// Render the call path as `A » B » C`, with at most
    /// `max_displayable_calls` shown and an elision marker for the omitted
    /// prefix. The root context renders empty.
    pub fn pretty(&self, max_displayable_calls: usize) -> String {
        let transitions = self.significant_transitions();
        if transitions.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        let shown = if transitions.len() > max_displayable_calls {
            out.push_str(&format!(
                "({} more) [...] ",
                transitions.len() - max_displayable_calls
            ));
            &transitions[transitions.len() - max_displayable_calls..]
        } else {
            &transitions[..]
        };
        let rendered: Vec<String> = shown
            .iter()
            .map(|transition| transition.target().to_string())
            .collect();
        out.push_str(&rendered.join(" \u{bb} "));
        out
    }
}

impl PartialEq for CallString {
    fn eq(&self, other: &Self) -> bool {
        if self.max_significant != other.max_significant
            || self.significant_len != other.significant_len
        {
            return false;
        }
        let mut a = &self.significant;
        let mut b = &other.significant;
        while let (Some(node_a), Some(node_b)) = (a, b) {
            if node_a.transition != node_b.transition {
                return false;
            }
            a = &node_a.rest;
            b = &node_b.rest;
        }
        true
    }
}

impl Eq for CallString {}

impl Hash for CallString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.max_significant.hash(state);
        let mut cursor = &self.significant;
        while let Some(node) = cursor {
            node.transition.hash(state);
            cursor = &node.rest;
        }
    }
}

impl PartialOrd for CallString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CallString {
    /// Shorter significant sequences first, then lexicographic on the
    /// significant sequence, then by bound. Consistent with `Eq` (the
    /// backlog takes part in neither).
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.significant_len
            .cmp(&other.significant_len)
            .then_with(|| self.significant_transitions().cmp(&other.significant_transitions()))
            .then_with(|| self.max_significant.cmp(&other.max_significant))
    }
}

impl fmt::Display for CallString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, transition) in self.significant_transitions().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{transition}")?;
        }
        write!(f, "]")
    }
}
