//! Stack growth for the recursive walks over user programs.
//!
//! Parsing and evaluation recurse once per nesting level, so a deep but valid program can
//! outrun the host stack, especially in unoptimized builds. Wrapping each recursive step in
//! [`ensure_sufficient_stack`] grows the stack on demand instead.

/// If less than this much stack remains, grow before recursing.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
