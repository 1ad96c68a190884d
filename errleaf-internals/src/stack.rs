//! Per-type stacks of active slot frames.
//!
//! Every active slot of payload type `E` on a thread owns exactly one frame in
//! that thread's [`SlotStack<E>`]. Frames are pushed on activation and popped
//! on deactivation in strict LIFO order, so the frame below a slot's frame is
//! always the slot that was active before it (its predecessor).
//!
//! Each push is stamped with a process-wide unique token and reported back as
//! a [`FrameId`]. Lookups check the token as well as the position, so a frame
//! pushed by one slot can never be mistaken for another slot's frame at the
//! same depth, on this thread or any other.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::keyed::Keyed;

/// Source of activation tokens. Zero is never handed out.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Frames reserved by the first push, so that nesting up to this depth
/// allocates once per payload type per thread.
pub const RESERVED_FRAMES: usize = 8;

/// Identifies one pushed frame: its position and its activation token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId {
    /// Position counted from the bottom of the stack.
    index: usize,
    /// Unique token stamped on the frame when it was pushed.
    token: u64,
}

impl FrameId {
    /// Position of the frame, counted from the bottom of the stack.
    #[inline]
    pub fn index(self) -> usize {
        self.index
    }
}

/// A pushed frame and the token it was stamped with.
#[derive(Debug)]
struct Frame<E> {
    /// Activation token, see [`FrameId`].
    token: u64,
    /// The payload storage of the owning slot.
    keyed: Keyed<E>,
}

/// The frames of all active slots of one payload type, innermost last.
#[derive(Debug)]
pub struct SlotStack<E> {
    /// Frame `i` belongs to the slot activated at depth `i`.
    frames: Vec<Frame<E>>,
}

impl<E> Default for SlotStack<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SlotStack<E> {
    /// Creates an empty stack. Does not allocate.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of active slots of this payload type.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a new top frame and returns its identity.
    pub fn push(&mut self, keyed: Keyed<E>) -> FrameId {
        if self.frames.capacity() == 0 {
            self.frames.reserve_exact(RESERVED_FRAMES);
        }
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        self.frames.push(Frame { token, keyed });
        FrameId {
            index: self.frames.len() - 1,
            token,
        }
    }

    /// The frame directly below `id`, if `id` is on this stack and is not the
    /// bottom frame.
    pub fn below(&self, id: FrameId) -> Option<FrameId> {
        if !self.contains(id) {
            return None;
        }
        let index = id.index.checked_sub(1)?;
        self.frames.get(index).map(|frame| FrameId {
            index,
            token: frame.token,
        })
    }

    /// Returns `true` if the frame `id` is still on this stack.
    #[inline]
    pub fn contains(&self, id: FrameId) -> bool {
        self.frames
            .get(id.index)
            .is_some_and(|frame| frame.token == id.token)
    }

    /// Returns `true` if `id` is the innermost frame of this stack.
    #[inline]
    pub fn is_top(&self, id: FrameId) -> bool {
        id.index + 1 == self.frames.len() && self.contains(id)
    }

    /// Pops the frame `id`.
    ///
    /// Returns `None`, leaving the stack untouched, if `id` is not the top.
    pub fn pop(&mut self, id: FrameId) -> Option<Keyed<E>> {
        if self.is_top(id) {
            self.frames.pop().map(|frame| frame.keyed)
        } else {
            None
        }
    }

    /// The frame that currently receives loads, if any slot is active.
    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut Keyed<E>> {
        self.frames.last_mut().map(|frame| &mut frame.keyed)
    }

    /// The storage of frame `id`, if it is still on this stack.
    #[inline]
    pub fn frame(&self, id: FrameId) -> Option<&Keyed<E>> {
        match self.frames.get(id.index) {
            Some(frame) if frame.token == id.token => Some(&frame.keyed),
            _ => None,
        }
    }

    /// The storage of frame `id`, if it is still on this stack.
    #[inline]
    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Keyed<E>> {
        match self.frames.get_mut(id.index) {
            Some(frame) if frame.token == id.token => Some(&mut frame.keyed),
            _ => None,
        }
    }

    /// Moves `payload` into frame `id` if that frame is empty.
    ///
    /// Returns the payload back when the frame already holds one (the earlier
    /// payload wins) or when the frame is no longer on this stack.
    pub fn fill_if_empty(&mut self, id: FrameId, payload: (u32, E)) -> Option<(u32, E)> {
        match self.frame_mut(id) {
            Some(frame) if frame.is_empty() => {
                let (key, value) = payload;
                let (_, displaced) = frame.put(key, value);
                debug_assert!(displaced.is_none());
                None
            }
            _ => Some(payload),
        }
    }
}
