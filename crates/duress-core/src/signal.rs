//! Single-fire scenario signals
//!
//! Establishment can only succeed and collapse can only fail, so each gets
//! its own future type instead of a shared `Result`-yielding one.

use crate::channel::Subscription;
use crate::error::CollapseReason;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Resolves once the scenario's condition has been established
#[derive(Debug)]
#[must_use = "signals do nothing unless awaited"]
pub struct Establishment {
    inner: EstablishmentInner,
}

#[derive(Debug)]
enum EstablishmentInner {
    Ready,
    Waiting(Subscription<(), Infallible>),
    Done,
}

impl Establishment {
    pub(crate) fn ready() -> Self {
        Self {
            inner: EstablishmentInner::Ready,
        }
    }

    pub(crate) fn waiting(subscription: Subscription<(), Infallible>) -> Self {
        Self {
            inner: EstablishmentInner::Waiting(subscription),
        }
    }

    /// Whether awaiting this signal would complete immediately
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, EstablishmentInner::Ready)
    }

    /// Stop waiting; the signal never resolves afterwards
    pub fn cancel(&mut self) {
        self.inner = EstablishmentInner::Done;
    }
}

impl Future for Establishment {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match &mut this.inner {
            EstablishmentInner::Ready => {
                this.inner = EstablishmentInner::Done;
                Poll::Ready(())
            }
            EstablishmentInner::Waiting(subscription) => {
                let outcome = ready!(Pin::new(subscription).poll(cx));
                this.inner = EstablishmentInner::Done;
                match outcome {
                    Ok(()) => Poll::Ready(()),
                    Err(never) => match never {},
                }
            }
            EstablishmentInner::Done => Poll::Pending,
        }
    }
}

/// Resolves with a reason if the scenario's condition stops holding
///
/// Never resolves successfully. Pending means "healthy so far", not
/// "healthy forever".
#[derive(Debug)]
#[must_use = "signals do nothing unless awaited"]
pub struct Collapse {
    inner: CollapseInner,
}

#[derive(Debug)]
enum CollapseInner {
    Fired(CollapseReason),
    Waiting(Subscription<Infallible, CollapseReason>),
    Done,
}

impl Collapse {
    pub(crate) fn fired(reason: CollapseReason) -> Self {
        Self {
            inner: CollapseInner::Fired(reason),
        }
    }

    pub(crate) fn waiting(subscription: Subscription<Infallible, CollapseReason>) -> Self {
        Self {
            inner: CollapseInner::Waiting(subscription),
        }
    }

    /// Whether the collapse had already happened when this signal was taken
    pub fn has_fired(&self) -> bool {
        matches!(self.inner, CollapseInner::Fired(_))
    }

    /// Stop watching; the signal never resolves afterwards
    pub fn cancel(&mut self) {
        self.inner = CollapseInner::Done;
    }
}

impl Future for Collapse {
    type Output = CollapseReason;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<CollapseReason> {
        let this = self.get_mut();
        match &mut this.inner {
            CollapseInner::Fired(_) => {
                match std::mem::replace(&mut this.inner, CollapseInner::Done) {
                    CollapseInner::Fired(reason) => Poll::Ready(reason),
                    _ => Poll::Pending,
                }
            }
            CollapseInner::Waiting(subscription) => {
                let outcome = ready!(Pin::new(subscription).poll(cx));
                this.inner = CollapseInner::Done;
                match outcome {
                    Ok(never) => match never {},
                    Err(reason) => Poll::Ready(reason),
                }
            }
            CollapseInner::Done => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EventChannel;
    use futures::FutureExt;

    #[test]
    fn test_establishment_waits_for_publish() {
        let channel: EventChannel<(), Infallible> = EventChannel::new();
        let mut signal = Establishment::waiting(channel.subscribe());

        assert!(!signal.is_ready());
        assert!((&mut signal).now_or_never().is_none());
        channel.publish_success(());
        assert_eq!((&mut signal).now_or_never(), Some(()));
        assert!((&mut signal).now_or_never().is_none());
    }

    #[test]
    fn test_ready_establishment_resolves_immediately() {
        assert_eq!(Establishment::ready().now_or_never(), Some(()));
    }

    #[test]
    fn test_collapse_resolves_with_reason() {
        let channel: EventChannel<Infallible, CollapseReason> = EventChannel::new();
        let signal = Collapse::waiting(channel.subscribe());

        channel.publish_failure(CollapseReason::Other("gone".to_string()));
        assert_eq!(
            signal.now_or_never(),
            Some(CollapseReason::Other("gone".to_string()))
        );
    }

    #[test]
    fn test_cancelled_collapse_stays_pending() {
        let channel: EventChannel<Infallible, CollapseReason> = EventChannel::new();
        let mut signal = Collapse::waiting(channel.subscribe());

        signal.cancel();
        assert_eq!(channel.pending(), 0);
        channel.publish_failure(CollapseReason::Other("late".to_string()));
        assert!(signal.now_or_never().is_none());
    }

    #[test]
    fn test_fired_collapse_resolves_once() {
        let mut signal = Collapse::fired(CollapseReason::Other("earlier".to_string()));
        assert!(signal.has_fired());
        assert!((&mut signal).now_or_never().is_some());
        assert!((&mut signal).now_or_never().is_none());
    }
}
