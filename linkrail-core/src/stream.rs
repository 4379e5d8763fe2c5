//! A minimal reactive-stream abstraction.
//!
//! Handlers and the response body assembler in `linkrail-router` are
//! expressed entirely with these combinators: `map`, `concat` (sequential
//! concatenation of two streams, never interleaved), `flat_map_sequential`
//! (one inner stream at a time, preserving source order — this is what
//! gives SSE its "concat-map" guarantee, never interleaving two events'
//! bytes), `do_on_complete` and `do_on_cancel` (side effects for
//! buffer/refcount bookkeeping). Built on `futures_util::Stream`.
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::error::AnyError;

/// A completion-style byte stream: `next_chunk` yields one chunk at a time
/// until the resource is exhausted. This mirrors the shape of a
/// `monoio`-flavored I/O stream (poll-free, a plain `async fn`) rather than
/// `futures::Stream`, since the concrete producers backing it (file reads,
/// proxied upstream bodies) are themselves completion-based.
pub trait ByteStream {
    fn next_chunk(&mut self) -> impl Future<Output = Option<Result<Bytes, AnyError>>>;
}

/// Extension trait adding the combinators spec §9 names to any `Stream`.
pub trait ReactiveStreamExt: Stream + Sized {
    fn concat_with<S>(self, next: S) -> Concat<Self, S>
    where
        S: Stream<Item = Self::Item>,
    {
        Concat {
            first: self,
            second: next,
            first_done: false,
        }
    }

    fn flat_map_sequential<U, F>(self, f: F) -> FlatMapSequential<Self, U, F>
    where
        U: Stream,
        F: FnMut(Self::Item) -> U,
    {
        FlatMapSequential {
            outer: self,
            inner: None,
            f,
        }
    }

    fn do_on_complete<F>(self, f: F) -> DoOnComplete<Self, F>
    where
        F: FnMut(),
    {
        DoOnComplete {
            inner: self,
            f,
            fired: false,
        }
    }

    fn do_on_cancel<F>(self, on_cancel: F) -> DoOnCancel<Self, F>
    where
        F: FnMut(),
    {
        DoOnCancel {
            inner: self,
            on_cancel,
            completed: false,
        }
    }
}

impl<S: Stream> ReactiveStreamExt for S {}

pin_project! {
    /// Emits every item of `first`, then every item of `second`. Never
    /// interleaves the two, matching the ordering guarantee spec §5
    /// requires within a single response body.
    pub struct Concat<A, B> {
        #[pin]
        first: A,
        #[pin]
        second: B,
        first_done: bool,
    }
}

impl<A, B> Stream for Concat<A, B>
where
    A: Stream,
    B: Stream<Item = A::Item>,
{
    type Item = A::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if !*this.first_done {
            match this.first.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => *this.first_done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
        this.second.as_mut().poll_next(cx)
    }
}

pin_project! {
    /// Maps each outer item to an inner stream and polls inner streams one
    /// at a time, in the order the outer stream produced them: this is the
    /// "concat-map" semantics the SSE framer and the raw-body chunk
    /// assembler both rely on.
    pub struct FlatMapSequential<S, U, F> {
        #[pin]
        outer: S,
        #[pin]
        inner: Option<U>,
        f: F,
    }
}

impl<S, U, F> Stream for FlatMapSequential<S, U, F>
where
    S: Stream,
    U: Stream,
    F: FnMut(S::Item) -> U,
{
    type Item = U::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(inner) = this.inner.as_mut().as_pin_mut() {
                match inner.poll_next(cx) {
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                    Poll::Ready(None) => this.inner.set(None),
                    Poll::Pending => return Poll::Pending,
                }
                continue;
            }
            match this.outer.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => this.inner.set(Some((this.f)(item))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

pin_project! {
    pub struct DoOnComplete<S, F> {
        #[pin]
        inner: S,
        f: F,
        fired: bool,
    }
}

impl<S, F> Stream for DoOnComplete<S, F>
where
    S: Stream,
    F: FnMut(),
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.inner.poll_next(cx);
        if matches!(poll, Poll::Ready(None)) && !*this.fired {
            *this.fired = true;
            (this.f)();
        }
        poll
    }
}

pin_project! {
    /// Runs `on_cancel` exactly once if the stream is dropped before it
    /// completed naturally -- the hook the router uses to release
    /// in-flight buffers when a client resets a stream (spec §5
    /// "Cancellation").
    pub struct DoOnCancel<S, F: FnMut()> {
        #[pin]
        inner: S,
        on_cancel: F,
        completed: bool,
    }
}

impl<S, F> Stream for DoOnCancel<S, F>
where
    S: Stream,
    F: FnMut(),
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let poll = this.inner.poll_next(cx);
        if matches!(poll, Poll::Ready(None)) {
            *this.completed = true;
        }
        poll
    }
}

impl<S, F: FnMut()> Drop for DoOnCancel<S, F> {
    fn drop(&mut self) {
        if !self.completed {
            (self.on_cancel)();
        }
    }
}

/// A future that completes alongside a stream's final item but carries its
/// own side channel, mirroring `monolake_services::http::util::MaybeDoubleFuture`:
/// useful for driving "read the inbound body while the handler runs" style
/// accompaniment without an executor-level join.
pub struct Accompany<Main, Side> {
    main: Main,
    side: Option<Side>,
}

impl<Main, Side> Accompany<Main, Side>
where
    Main: Future,
{
    pub fn new(main: Main, side: Option<Side>) -> Self {
        Self { main, side }
    }
}

impl<Main, Side> Future for Accompany<Main, Side>
where
    Main: Future + Unpin,
    Side: Future + Unpin,
{
    type Output = Main::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(side) = self.side.as_mut() {
            if Pin::new(side).poll(cx).is_ready() {
                self.side = None;
            }
        }
        Pin::new(&mut self.main).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use futures_util::{stream, StreamExt};

    use super::*;

    #[test]
    fn concat_preserves_order() {
        let a = stream::iter(vec![1, 2]);
        let b = stream::iter(vec![3, 4]);
        let out: Vec<_> = block_on(a.concat_with(b).collect());
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn flat_map_sequential_never_interleaves() {
        let outer = stream::iter(vec![vec!["a1", "a2"], vec!["b1", "b2"]]);
        let out: Vec<_> = block_on(outer.flat_map_sequential(stream::iter).collect());
        assert_eq!(out, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn do_on_cancel_fires_on_drop_before_completion() {
        use std::{cell::Cell, rc::Rc};
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();
        {
            let s = stream::iter(vec![1, 2, 3]).do_on_cancel(move || fired_clone.set(true));
            futures_util::pin_mut!(s);
            let _ = block_on(s.next());
            // dropped mid-stream here
        }
        assert!(fired.get());
    }

    #[test]
    fn do_on_cancel_does_not_fire_on_natural_completion() {
        use std::{cell::Cell, rc::Rc};
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();
        let out: Vec<_> = block_on(
            stream::iter(vec![1, 2])
                .do_on_cancel(move || fired_clone.set(true))
                .collect(),
        );
        assert_eq!(out, vec![1, 2]);
        assert!(!fired.get());
    }
}
