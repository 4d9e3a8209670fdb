//! A single venue's WebSocket connection: lifecycle supervisor, read loop,
//! ping loop, and ordered subscription replay on reconnect.

use crate::adapter::VenueStreamAdapter;
use crate::error::StreamError;
use crate::events::StreamEvent;
use crate::frame::{MarketEvent, StreamFrame};
use crate::state::{BackoffPolicy, ConnectionState};
use market_facade_core::EventListeners;
use market_facade_types::CanonicalSymbol;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Subscription {
    channel: String,
    symbol: CanonicalSymbol,
    channel_id: StdMutex<Option<String>>,
    tx: broadcast::Sender<MarketEvent>,
}

/// Per-venue connection state machine plus its subscription table.
pub(crate) struct VenueConnection {
    venue: String,
    adapter: Arc<dyn VenueStreamAdapter>,
    backoff: BackoffPolicy,
    read_deadline: std::time::Duration,
    ping_interval: std::time::Duration,
    subscribe_confirm_timeout: std::time::Duration,
    delivery_buffer: usize,
    event_listeners: EventListeners<StreamEvent>,
    state_tx: watch::Sender<ConnectionState>,
    /// Ordered so reconnect replays subscriptions in subscribe order.
    subs: StdMutex<Vec<Arc<Subscription>>>,
    channel_index: StdMutex<HashMap<String, Arc<Subscription>>>,
    pending_acks: StdMutex<HashMap<String, oneshot::Sender<Result<String, StreamError>>>>,
    supervisor: StdMutex<Option<JoinHandle<()>>>,
}

impl VenueConnection {
    pub(crate) fn new(
        adapter: Arc<dyn VenueStreamAdapter>,
        backoff: BackoffPolicy,
        read_deadline: std::time::Duration,
        ping_interval: std::time::Duration,
        subscribe_confirm_timeout: std::time::Duration,
        delivery_buffer: usize,
        event_listeners: EventListeners<StreamEvent>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            venue: adapter.venue().to_string(),
            adapter,
            backoff,
            read_deadline,
            ping_interval,
            subscribe_confirm_timeout,
            delivery_buffer,
            event_listeners,
            state_tx,
            subs: StdMutex::new(Vec::new()),
            channel_index: StdMutex::new(HashMap::new()),
            pending_acks: StdMutex::new(HashMap::new()),
            supervisor: StdMutex::new(None),
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    fn emit(&self, event: StreamEvent) {
        self.event_listeners.emit(&event);
    }

    /// Starts the supervisor task on first call; subsequent calls are no-ops.
    fn ensure_started(self: &Arc<Self>, ctx: &CancellationToken) {
        let mut guard = self.supervisor.lock().expect("supervisor lock poisoned");
        if guard.is_some() {
            return;
        }
        let this = Arc::clone(self);
        let child_ctx = ctx.child_token();
        *guard = Some(tokio::spawn(async move { this.run(child_ctx).await }));
    }

    async fn run(self: Arc<Self>, ctx: CancellationToken) {
        let mut delay = self.backoff.initial();

        loop {
            if ctx.is_cancelled() {
                self.set_state(ConnectionState::Closed);
                self.emit(StreamEvent::Closed { venue: self.venue.clone(), timestamp: Instant::now() });
                return;
            }

            self.set_state(ConnectionState::Connecting);
            self.emit(StreamEvent::Connecting { venue: self.venue.clone(), timestamp: Instant::now() });

            match self.adapter.connect(ctx.clone()).await {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    self.emit(StreamEvent::Connected { venue: self.venue.clone(), timestamp: Instant::now() });
                    delay = self.backoff.initial();

                    if let Err(_e) = self.resubscribe_all(&ctx).await {
                        let _ = self.adapter.disconnect(ctx.clone()).await;
                        self.enter_backoff(&mut delay, &ctx).await;
                        continue;
                    }

                    tokio::select! {
                        _ = self.read_loop(ctx.clone()) => {}
                        _ = self.ping_loop(ctx.clone()) => {}
                        _ = ctx.cancelled() => {
                            let _ = self.adapter.disconnect(ctx.clone()).await;
                            self.set_state(ConnectionState::Closed);
                            self.emit(StreamEvent::Closed { venue: self.venue.clone(), timestamp: Instant::now() });
                            return;
                        }
                    }

                    let _ = self.adapter.disconnect(ctx.clone()).await;
                    self.emit(StreamEvent::Disconnected { venue: self.venue.clone(), timestamp: Instant::now() });
                    self.enter_backoff(&mut delay, &ctx).await;
                }
                Err(_e) => {
                    self.emit(StreamEvent::HandshakeFailed { venue: self.venue.clone(), timestamp: Instant::now() });
                    self.enter_backoff(&mut delay, &ctx).await;
                }
            }
        }
    }

    async fn enter_backoff(&self, delay: &mut std::time::Duration, ctx: &CancellationToken) {
        self.set_state(ConnectionState::Backoff(*delay));
        self.emit(StreamEvent::BackoffScheduled {
            venue: self.venue.clone(),
            delay: *delay,
            timestamp: Instant::now(),
        });
        tokio::select! {
            _ = tokio::time::sleep(*delay) => {}
            _ = ctx.cancelled() => {}
        }
        *delay = self.backoff.next(*delay);
    }

    async fn read_loop(&self, ctx: CancellationToken) {
        loop {
            if ctx.is_cancelled() {
                return;
            }
            match tokio::time::timeout(self.read_deadline, self.adapter.read_frame(ctx.clone())).await {
                Ok(Ok(frame)) => self.dispatch(frame),
                Ok(Err(_e)) => return,
                Err(_elapsed) => return,
            }
        }
    }

    async fn ping_loop(&self, ctx: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.ping_interval) => {}
                _ = ctx.cancelled() => return,
            }
            match tokio::time::timeout(std::time::Duration::from_secs(5), self.adapter.send_ping(ctx.clone())).await {
                Ok(Ok(())) => {}
                _ => return,
            }
        }
    }

    fn dispatch(&self, frame: StreamFrame) {
        match frame {
            StreamFrame::SubscribeAck { correlation_id, channel_id } => {
                if let Some(tx) = self.pending_acks.lock().expect("acks lock poisoned").remove(&correlation_id) {
                    let _ = tx.send(Ok(channel_id));
                }
            }
            StreamFrame::SubscribeNack { correlation_id, reason } => {
                if let Some(tx) = self.pending_acks.lock().expect("acks lock poisoned").remove(&correlation_id) {
                    let _ = tx.send(Err(StreamError::SubscribeRejected(reason)));
                }
            }
            StreamFrame::Data { channel_id, event } => {
                let sub = self.channel_index.lock().expect("index lock poisoned").get(&channel_id).cloned();
                if let Some(sub) = sub {
                    if sub.tx.send(event).is_err() {
                        self.emit(StreamEvent::FrameDropped {
                            venue: self.venue.clone(),
                            channel: sub.channel.clone(),
                            timestamp: Instant::now(),
                        });
                    }
                }
            }
            StreamFrame::Pong => {}
        }
    }

    async fn do_subscribe(
        &self,
        ctx: &CancellationToken,
        correlation_id: &str,
        channel: &str,
        symbol: &CanonicalSymbol,
    ) -> Result<String, StreamError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending_acks
            .lock()
            .expect("acks lock poisoned")
            .insert(correlation_id.to_string(), ack_tx);

        if let Err(e) = self.adapter.send_subscribe(ctx.clone(), correlation_id, channel, symbol).await {
            self.pending_acks.lock().expect("acks lock poisoned").remove(correlation_id);
            return Err(e);
        }

        match tokio::time::timeout(self.subscribe_confirm_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StreamError::Closed),
            Err(_) => {
                self.pending_acks.lock().expect("acks lock poisoned").remove(correlation_id);
                Err(StreamError::SubscribeTimeout)
            }
        }
    }

    /// Replays every currently-tracked subscription in order, in full
    /// before returning. Used both for initial subscribes and reconnect.
    async fn resubscribe_all(&self, ctx: &CancellationToken) -> Result<(), StreamError> {
        let snapshot: Vec<Arc<Subscription>> = self.subs.lock().expect("subs lock poisoned").clone();
        for sub in snapshot {
            let correlation_id = format!("{}:{}:{}", self.venue, sub.channel, sub.symbol);
            let channel_id = self.do_subscribe(ctx, &correlation_id, &sub.channel, &sub.symbol).await?;
            *sub.channel_id.lock().expect("channel_id lock poisoned") = Some(channel_id.clone());
            self.channel_index.lock().expect("index lock poisoned").insert(channel_id, Arc::clone(&sub));
            self.emit(StreamEvent::Subscribed {
                venue: self.venue.clone(),
                channel: sub.channel.clone(),
                timestamp: Instant::now(),
            });
        }
        Ok(())
    }

    async fn wait_until_connected(&self, ctx: &CancellationToken) -> Result<(), StreamError> {
        let mut rx = self.state_tx.subscribe();
        loop {
            if rx.borrow().is_connected() {
                return Ok(());
            }
            if rx.borrow().is_closed() {
                return Err(StreamError::Closed);
            }
            tokio::select! {
                changed = rx.changed() => { changed.map_err(|_| StreamError::Closed)?; }
                _ = ctx.cancelled() => return Err(StreamError::Cancelled),
            }
        }
    }

    pub(crate) async fn subscribe(
        self: &Arc<Self>,
        ctx: CancellationToken,
        channel: &str,
        symbol: CanonicalSymbol,
    ) -> Result<broadcast::Receiver<MarketEvent>, StreamError> {
        {
            let subs = self.subs.lock().expect("subs lock poisoned");
            if let Some(existing) = subs.iter().find(|s| s.channel == channel && s.symbol == symbol) {
                return Ok(existing.tx.subscribe());
            }
        }

        self.ensure_started(&ctx);
        self.wait_until_connected(&ctx).await?;

        let correlation_id = format!("{}:{}:{}", self.venue, channel, symbol);
        let (tx, rx) = broadcast::channel(self.delivery_buffer);
        let channel_id = self.do_subscribe(&ctx, &correlation_id, channel, &symbol).await?;

        let sub = Arc::new(Subscription {
            channel: channel.to_string(),
            symbol,
            channel_id: StdMutex::new(Some(channel_id.clone())),
            tx,
        });
        self.subs.lock().expect("subs lock poisoned").push(Arc::clone(&sub));
        self.channel_index.lock().expect("index lock poisoned").insert(channel_id, sub);
        self.emit(StreamEvent::Subscribed {
            venue: self.venue.clone(),
            channel: channel.to_string(),
            timestamp: Instant::now(),
        });

        Ok(rx)
    }

    /// Removes a subscription from the table. Returns `true` if no
    /// subscriptions remain on this connection.
    pub(crate) fn unsubscribe(&self, channel: &str, symbol: &CanonicalSymbol) -> bool {
        let mut subs = self.subs.lock().expect("subs lock poisoned");
        if let Some(pos) = subs.iter().position(|s| s.channel == channel && &s.symbol == symbol) {
            let removed = subs.remove(pos);
            if let Some(id) = removed.channel_id.lock().expect("channel_id lock poisoned").clone() {
                self.channel_index.lock().expect("index lock poisoned").remove(&id);
            }
        }
        subs.is_empty()
    }

    pub(crate) fn shutdown(&self) {
        if let Some(handle) = self.supervisor.lock().expect("supervisor lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for VenueConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}
