//! Mock fix source for testing and development

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use crate::core::RawFix;
use crate::source::{FixEvent, FixRequest, FixSource, FixSubscription, SourceError, SubscriptionId};

struct MockState {
    availability: Result<(), SourceError>,
    one_shot: VecDeque<Result<RawFix, SourceError>>,
    one_shot_requests: Vec<FixRequest>,
    subscribe_error: Option<SourceError>,
    subscriber: Option<(SubscriptionId, mpsc::UnboundedSender<FixEvent>)>,
    watch_requests: Vec<FixRequest>,
    cancelled: Vec<SubscriptionId>,
    next_id: u64,
}

/// Scripted fix source
///
/// One-shot requests are answered from a queue (an empty queue times out).
/// Continuous fixes are pushed with [`MockFixSource::emit`].
pub struct MockFixSource {
    state: Mutex<MockState>,
    subscribed: Notify,
}

impl MockFixSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                availability: Ok(()),
                one_shot: VecDeque::new(),
                one_shot_requests: Vec::new(),
                subscribe_error: None,
                subscriber: None,
                watch_requests: Vec::new(),
                cancelled: Vec::new(),
                next_id: 1,
            }),
            subscribed: Notify::new(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate a denied or missing capability
    pub fn set_availability(&self, availability: Result<(), SourceError>) {
        self.state().availability = availability;
    }

    /// Queue an answer for the next one-shot request
    pub fn queue_fix(&self, fix: RawFix) {
        self.state().one_shot.push_back(Ok(fix));
    }

    pub fn queue_error(&self, error: SourceError) {
        self.state().one_shot.push_back(Err(error));
    }

    /// Make the next `subscribe` call fail
    pub fn fail_subscribe(&self, error: SourceError) {
        self.state().subscribe_error = Some(error);
    }

    /// Push a fix to the active subscription; false if nobody is subscribed
    pub fn emit(&self, fix: RawFix) -> bool {
        self.send(Ok(fix))
    }

    pub fn emit_error(&self, error: SourceError) -> bool {
        self.send(Err(error))
    }

    fn send(&self, event: FixEvent) -> bool {
        match &self.state().subscriber {
            Some((_, sender)) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Wait until a subscription has been opened
    pub async fn wait_for_subscription(&self) {
        loop {
            let notified = self.subscribed.notified();
            if self.is_subscribed() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.state().subscriber.is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.state().watch_requests.len()
    }

    pub fn cancelled_count(&self) -> usize {
        self.state().cancelled.len()
    }

    pub fn one_shot_requests(&self) -> Vec<FixRequest> {
        self.state().one_shot_requests.clone()
    }

    pub fn watch_requests(&self) -> Vec<FixRequest> {
        self.state().watch_requests.clone()
    }
}

impl Default for MockFixSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FixSource for MockFixSource {
    fn availability(&self) -> Result<(), SourceError> {
        self.state().availability.clone()
    }

    async fn get_one_fix(&self, request: FixRequest) -> Result<RawFix, SourceError> {
        let mut state = self.state();
        state.one_shot_requests.push(request);
        state.one_shot.pop_front().unwrap_or(Err(SourceError::Timeout))
    }

    fn subscribe(&self, request: FixRequest) -> Result<FixSubscription, SourceError> {
        let subscription = {
            let mut state = self.state();
            if let Some(error) = state.subscribe_error.take() {
                return Err(error);
            }
            let id = SubscriptionId::new(state.next_id);
            state.next_id += 1;
            state.watch_requests.push(request);

            let (sender, receiver) = mpsc::unbounded_channel();
            state.subscriber = Some((id, sender));
            FixSubscription::new(id, receiver)
        };
        self.subscribed.notify_waiters();
        Ok(subscription)
    }

    fn cancel(&self, id: SubscriptionId) {
        let mut state = self.state();
        if matches!(&state.subscriber, Some((active, _)) if *active == id) {
            // Dropping the sender ends the subscriber's stream
            state.subscriber = None;
            state.cancelled.push(id);
        }
    }
}
