//! Reactive stream operators.
//!
//! Decision pipelines are push-based: every input is a stream that may emit
//! new values at any time, and every output is recomputed from the latest
//! value of each input. The operators here are the few building blocks the
//! pipelines need on top of `futures::Stream`:
//!
//! - [`combine_latest`]: emits the latest value of every source whenever
//!   any source emits, once all sources have emitted at least once.
//! - [`SwitchMap`]: maps every outer value to an inner stream and forwards
//!   only the most recent inner stream, dropping (and thus cancelling) the
//!   previous one.
//! - [`DistinctUntilChanged`]: suppresses consecutive duplicates.
//!
//! Cancellation is structural. Dropping a stream drops every stream it owns,
//! so dropping the outermost decision stream releases every attribute
//! subscription underneath it.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, SelectAll, Stream, StreamExt};
use futures::{future, ready};

use crate::decision::AuthorizationDecision;
use crate::value::Val;

/// A boxed, sendable, owned stream.
pub type BoxStream<T> = futures::stream::BoxStream<'static, T>;

/// A stream of evaluation values.
pub type ValStream = BoxStream<Val>;

/// A stream of authorization decisions.
pub type DecisionStream = BoxStream<AuthorizationDecision>;

/// A stream emitting exactly one value and then completing.
pub fn just<T: Send + 'static>(value: T) -> BoxStream<T> {
    stream::once(future::ready(value)).boxed()
}

/// Combine the latest values of several streams.
///
/// An empty input emits a single empty vector, so a combination over zero
/// sources still produces a result.
pub fn combine_latest<T>(sources: Vec<BoxStream<T>>) -> BoxStream<Vec<T>>
where
    T: Clone + Unpin + Send + 'static,
{
    if sources.is_empty() {
        return just(Vec::new());
    }
    CombineLatest::new(sources).boxed()
}

/// Stream returned by [`combine_latest`].
pub struct CombineLatest<T> {
    sources: SelectAll<BoxStream<(usize, Option<T>)>>,
    latest: Vec<Option<T>>,
    missing: usize,
}

impl<T: Send + 'static> CombineLatest<T> {
    fn new(sources: Vec<BoxStream<T>>) -> Self {
        let count = sources.len();
        let indexed = sources.into_iter().enumerate().map(|(index, source)| {
            // A trailing `None` marks completion of this source.
            source
                .map(move |value| (index, Some(value)))
                .chain(stream::once(future::ready((index, None))))
                .boxed()
        });

        Self {
            sources: stream::select_all(indexed),
            latest: (0..count).map(|_| None).collect(),
            missing: count,
        }
    }
}

impl<T: Clone + Unpin> Stream for CombineLatest<T> {
    type Item = Vec<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.sources.poll_next_unpin(cx)) {
                Some((index, Some(value))) => {
                    if this.latest[index].is_none() {
                        this.missing -= 1;
                    }
                    this.latest[index] = Some(value);
                    if this.missing == 0 {
                        let snapshot = this.latest.iter().flatten().cloned().collect();
                        return Poll::Ready(Some(snapshot));
                    }
                }
                Some((index, None)) => {
                    // A source that completes without ever emitting means no
                    // combination can ever be produced.
                    if this.latest[index].is_none() {
                        return Poll::Ready(None);
                    }
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Stream returned by [`ReactiveExt::switch_map`].
pub struct SwitchMap<T, U, F> {
    outer: Option<BoxStream<T>>,
    inner: Option<BoxStream<U>>,
    f: F,
}

impl<T, U, F> Stream for SwitchMap<T, U, F>
where
    F: FnMut(T) -> BoxStream<U> + Unpin,
{
    type Item = U;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<U>> {
        let this = self.get_mut();

        // Only the most recent outer value gets an inner stream.
        while let Some(outer) = this.outer.as_mut() {
            match outer.poll_next_unpin(cx) {
                Poll::Ready(Some(value)) => this.inner = Some((this.f)(value)),
                Poll::Ready(None) => this.outer = None,
                Poll::Pending => break,
            }
        }

        if let Some(inner) = this.inner.as_mut() {
            match inner.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => this.inner = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        if this.outer.is_none() && this.inner.is_none() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

/// Stream returned by [`ReactiveExt::distinct_until_changed`].
pub struct DistinctUntilChanged<S: Stream> {
    stream: S,
    last: Option<S::Item>,
}

impl<S> Stream for DistinctUntilChanged<S>
where
    S: Stream + Unpin,
    S::Item: Clone + PartialEq + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.stream.poll_next_unpin(cx)) {
                Some(item) => {
                    if this.last.as_ref() == Some(&item) {
                        continue;
                    }
                    this.last = Some(item.clone());
                    return Poll::Ready(Some(item));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Reactive operators on any sendable stream.
pub trait ReactiveExt: Stream + Sized + Send + 'static {
    /// Map every value to a stream, following only the latest one.
    fn switch_map<U, F>(self, f: F) -> SwitchMap<Self::Item, U, F>
    where
        F: FnMut(Self::Item) -> BoxStream<U> + Unpin,
    {
        SwitchMap {
            outer: Some(self.boxed()),
            inner: None,
            f,
        }
    }

    /// Drop values equal to the previously emitted one.
    fn distinct_until_changed(self) -> DistinctUntilChanged<Self>
    where
        Self: Unpin,
        Self::Item: Clone + PartialEq,
    {
        DistinctUntilChanged {
            stream: self,
            last: None,
        }
    }
}

impl<S: Stream + Send + 'static> ReactiveExt for S {}
