use std::any::type_name;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Allows `#[derive(Message)]` to be used inside this crate.
extern crate self as actlet;

#[cfg(feature = "derive")]
pub use actlet_derive::Message;

pub mod prelude {
    pub use crate::Action;
    pub use crate::Actor;
    pub use crate::Address;
    pub use crate::Call;
    pub use crate::Caller;
    pub use crate::Context;
    pub use crate::Emit;
    pub use crate::Emitter;
    pub use crate::EmitterFactory;
    pub use crate::EmitterRegistry;
    pub use crate::Handler;
    pub use crate::Message;
    pub use crate::Signal;
    pub use crate::Spawn;
    pub use crate::Stop;
    pub use crate::System;
    pub use async_trait::async_trait;
}

/// Errors that may happen in communication with an actor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to send a message")]
    Send,
    #[error("Failed to receive a reply")]
    Recv,
}

pub type Result<T> = std::result::Result<T, Error>;

/// An actor system.
pub struct System {
    /// A cancellation token used for gracefully stopping the actor system.
    stop_token: CancellationToken,
}

impl System {
    /// Create an actor system.
    pub fn new() -> Self {
        System {
            stop_token: CancellationToken::new(),
        }
    }

    /// Invoke gracefully stopping the actor system.
    ///
    /// This function doesn't wait for all tasks spawned by the system getting
    /// stopped.
    pub fn stop(self) {
        self.stop_token.cancel();
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Spawn for System {
    async fn spawn_actor<A>(&self, actor: A) -> Address<A>
    where
        A: Actor,
    {
        MessageLoop::spawn(actor, self.stop_token.child_token())
    }

    fn spawn_task<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        spawn_cancellable(fut, self.stop_token.clone())
    }
}

/// An actor execution context.
pub struct Context<A> {
    own_addr: Address<A>,
    stop_token: CancellationToken,
}

impl<A> Context<A> {
    fn new(own_addr: Address<A>, stop_token: CancellationToken) -> Self {
        Context {
            own_addr,
            stop_token,
        }
    }

    /// Returns the address of the actor.
    pub fn address(&self) -> &Address<A> {
        &self.own_addr
    }

    /// Stops the actor.
    ///
    /// Tasks spawned from this context are cancelled as well.
    pub fn stop(&mut self) {
        self.stop_token.cancel();
    }
}

#[async_trait]
impl<A> Spawn for Context<A> {
    async fn spawn_actor<B>(&self, actor: B) -> Address<B>
    where
        B: Actor,
    {
        MessageLoop::spawn(actor, self.stop_token.child_token())
    }

    fn spawn_task<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        spawn_cancellable(fut, self.stop_token.clone())
    }
}

impl<A, M> EmitterFactory<M> for Context<A>
where
    A: Handler<M>,
    M: Signal + 'static,
{
    fn emitter(&self) -> Emitter<M> {
        self.own_addr.clone().into()
    }
}

/// An address of an actor.
pub struct Address<A> {
    sender: mpsc::Sender<Box<dyn Dispatch<A> + Send>>,
}

impl<A> Address<A> {
    const MAX_MESSAGES: usize = 256;

    fn pair() -> (Self, mpsc::Receiver<Box<dyn Dispatch<A> + Send>>) {
        let (sender, receiver) = mpsc::channel(Self::MAX_MESSAGES);
        let addr = Address { sender };
        (addr, receiver)
    }
}

impl<A> Clone for Address<A> {
    fn clone(&self) -> Self {
        Address {
            sender: self.sender.clone(),
        }
    }
}

impl<A, M> From<Address<A>> for Caller<M>
where
    A: Handler<M>,
    M: Action + 'static,
{
    fn from(addr: Address<A>) -> Self {
        Caller::new(addr)
    }
}

impl<A, M> From<Address<A>> for Emitter<M>
where
    A: Handler<M>,
    M: Signal + 'static,
{
    fn from(addr: Address<A>) -> Self {
        Emitter::new(addr)
    }
}

#[async_trait]
impl<A, M> Call<M> for Address<A>
where
    A: Handler<M>,
    // An message will be converted into `Box<dyn Dispatch>`.
    M: Action + 'static,
{
    async fn call(&self, msg: M) -> Result<M::Reply> {
        let (sender, receiver) = oneshot::channel::<M::Reply>();
        let dispatcher = Box::new(ActionDispatcher {
            message: msg,
            sender,
        });
        if self.sender.send(dispatcher).await.is_err() {
            tracing::error!("{} stopped", type_name::<A>());
            return Err(Error::Send);
        }
        receiver.await.map_err(|_| {
            tracing::error!("{} stopped", type_name::<A>());
            Error::Recv
        })
    }
}

#[async_trait]
impl<A, M> Emit<M> for Address<A>
where
    A: Handler<M>,
    // An message will be converted into `Box<dyn Dispatch>`.
    M: Signal + 'static,
{
    async fn emit(&self, msg: M) {
        let dispatcher = Box::new(SignalDispatcher { message: msg });
        if self.sender.send(dispatcher).await.is_err() {
            tracing::warn!("{} stopped", type_name::<A>());
        }
    }

    fn fire(&self, msg: M) {
        use mpsc::error::TrySendError;

        let dispatcher = Box::new(SignalDispatcher { message: msg });
        match self.sender.try_send(dispatcher) {
            Ok(_) => {
                // Succeeded to send synchronously.
            }
            Err(TrySendError::Full(dispatcher)) => {
                // Need sending using an async task.
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    if sender.send(dispatcher).await.is_err() {
                        tracing::warn!("{} stopped", type_name::<A>());
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("{} stopped", type_name::<A>());
            }
        }
    }
}

/// A type that implements [`Call<M>`] for a particular message.
pub struct Caller<M> {
    inner: Arc<dyn Call<M> + Send + Sync>,
}

impl<M> Caller<M>
where
    M: Action,
{
    pub fn new<T>(inner: T) -> Self
    where
        T: Call<M> + Send + Sync + 'static,
    {
        Caller {
            inner: Arc::new(inner),
        }
    }
}

impl<M> Clone for Caller<M> {
    fn clone(&self) -> Self {
        Caller {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl<M> Call<M> for Caller<M>
where
    M: Action,
{
    async fn call(&self, msg: M) -> Result<M::Reply> {
        self.inner.call(msg).await
    }
}

/// A type that implements [`Emit<M>`] for a particular message.
pub struct Emitter<M> {
    inner: Arc<dyn Emit<M> + Send + Sync>,
}

impl<M> Emitter<M>
where
    M: Signal,
{
    pub fn new<T>(inner: T) -> Self
    where
        T: Emit<M> + Send + Sync + 'static,
    {
        Emitter {
            inner: Arc::new(inner),
        }
    }
}

impl<M> Clone for Emitter<M> {
    fn clone(&self) -> Self {
        Emitter {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl<M> Emit<M> for Emitter<M>
where
    M: Signal,
{
    async fn emit(&self, msg: M) {
        self.inner.emit(msg).await
    }

    fn fire(&self, msg: M) {
        self.inner.fire(msg);
    }
}

/// A set of emitters identified by IDs assigned at registration.
pub struct EmitterRegistry<M> {
    next_id: usize,
    emitters: BTreeMap<usize, Emitter<M>>,
}

impl<M> EmitterRegistry<M>
where
    M: Signal + Clone,
{
    /// Registers an emitter and returns its ID.
    pub fn register(&mut self, emitter: Emitter<M>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.emitters.insert(id, emitter);
        id
    }

    /// Unregisters an emitter.  Unknown IDs are ignored.
    pub fn unregister(&mut self, id: usize) -> bool {
        self.emitters.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Sends a message to every registered emitter in registration order.
    pub async fn emit(&self, msg: M) {
        for emitter in self.emitters.values() {
            emitter.emit(msg.clone()).await;
        }
    }
}

impl<M> Default for EmitterRegistry<M> {
    fn default() -> Self {
        EmitterRegistry {
            next_id: 0,
            emitters: BTreeMap::new(),
        }
    }
}

/// A message to stop an actor.
pub struct Stop;
impl Message for Stop {
    type Reply = ();
}
impl Signal for Stop {}

#[async_trait]
impl<A: Actor> Handler<Stop> for A {
    async fn handle(&mut self, _msg: Stop, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}

// traits

/// A trait that every actor must implement.
#[async_trait]
pub trait Actor
where
    Self: Send + Sized,
    // An actor will be sent to a dedicated task created by `tokio::spawn()`.
    // And the following constraint is needed for the same reason as
    // `std::thread::spawn()`.
    Self: 'static,
{
    /// Called when the actor gets started running on a dedicated task.
    #[allow(unused_variables)]
    async fn started(&mut self, ctx: &mut Context<Self>) {}

    /// Called when the actor stopped.
    #[allow(unused_variables)]
    async fn stopped(&mut self, ctx: &mut Context<Self>) {}
}

/// A trait to spawn a new asynchronous task.
#[async_trait]
pub trait Spawn: Sized {
    /// Spawns a new asynchronous task dedicated for an actor.
    async fn spawn_actor<A>(&self, actor: A) -> Address<A>
    where
        A: Actor;

    /// Spawns a new asynchronous task dedicated for a `Future`.
    ///
    /// The task is cancelled when the owner of `self` stops.
    fn spawn_task<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
}

/// A trait to create an [`Emitter<M>`] sending messages to the owner.
pub trait EmitterFactory<M: Signal> {
    fn emitter(&self) -> Emitter<M>;
}

/// A trait that every message must implement.
pub trait Message: Send {
    /// The type of reply for this message.
    type Reply: Send;
}

/// A trait that every message sent by [`Call<M>`] must implement.
pub trait Action: Message {}

/// A trait to send a message and wait for its reply.
#[async_trait]
pub trait Call<M: Action> {
    /// Sends a message and waits for its reply.
    ///
    /// The `msg` will be lost if the actor has already stopped.
    async fn call(&self, msg: M) -> Result<M::Reply>;
}

/// A trait that every message sent by [`Emit<M>`] must implement.
pub trait Signal: Message<Reply = ()> {}

/// A trait to send every message.
#[async_trait]
pub trait Emit<M: Signal> {
    /// Sends a message.
    ///
    /// The `msg` will be lost if the actor has already stopped.
    async fn emit(&self, msg: M);

    /// Sends a message synchronously if possible.
    ///
    /// This function is useful when a message has to be sent outside `async fn`
    /// and `async` blocks such as `Drop::drop()`.
    ///
    /// The `msg` will be lost if the actor has already stopped.
    #[allow(unused_variables)]
    fn fire(&self, msg: M) {
        unimplemented!("Emit::fire");
    }
}

/// A trait to handle a message.
#[async_trait]
pub trait Handler<M>
where
    Self: Actor,
    M: Message,
{
    /// Performs a computation specified by a message and optionally returns a
    /// result of the computation.
    async fn handle(&mut self, msg: M, ctx: &mut Context<Self>) -> M::Reply;
}

// private types

fn spawn_cancellable<F>(fut: F, stop_token: CancellationToken) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = fut => (),
            _ = stop_token.cancelled() => (),
        }
    })
}

struct MessageLoop<A> {
    actor: A,
    receiver: mpsc::Receiver<Box<dyn Dispatch<A> + Send>>,
    context: Context<A>,
}

impl<A: Actor> MessageLoop<A> {
    fn spawn(actor: A, stop_token: CancellationToken) -> Address<A> {
        let (addr, receiver) = Address::pair();
        let context = Context::new(addr.clone(), stop_token);
        let mut message_loop = MessageLoop {
            actor,
            receiver,
            context,
        };
        tokio::spawn(async move { message_loop.run().await });
        addr
    }

    async fn run(&mut self) {
        self.actor.started(&mut self.context).await;
        let stop_token = self.context.stop_token.clone();
        loop {
            tokio::select! {
                Some(dispatch) = self.receiver.recv() => {
                    dispatch.dispatch(&mut self.actor, &mut self.context).await;
                }
                _ = stop_token.cancelled() => {
                    self.receiver.close();
                    break;
                }
                else => break,
            }
        }
        // Ensure that the remaining messages are processed before the stop.
        while let Some(dispatch) = self.receiver.recv().await {
            dispatch.dispatch(&mut self.actor, &mut self.context).await;
        }
        self.actor.stopped(&mut self.context).await;
    }
}

#[async_trait]
trait Dispatch<A> {
    async fn dispatch(self: Box<Self>, actor: &mut A, ctx: &mut Context<A>);
}

struct ActionDispatcher<M>
where
    M: Action,
{
    message: M,
    sender: oneshot::Sender<M::Reply>,
}

#[async_trait]
impl<A, M> Dispatch<A> for ActionDispatcher<M>
where
    A: Handler<M>,
    M: Action,
{
    async fn dispatch(self: Box<Self>, actor: &mut A, ctx: &mut Context<A>) {
        let ActionDispatcher { message, sender } = *self;
        let reply = actor.handle(message, ctx).await;
        if sender.send(reply).is_err() {
            tracing::error!("Failed to send, {} stopped", type_name::<A>());
        }
    }
}

struct SignalDispatcher<M>
where
    M: Signal,
{
    message: M,
}

#[async_trait]
impl<A, M> Dispatch<A> for SignalDispatcher<M>
where
    A: Handler<M>,
    M: Signal,
{
    async fn dispatch(self: Box<Self>, actor: &mut A, ctx: &mut Context<A>) {
        actor.handle(self.message, ctx).await;
    }
}

// <coverage:exclude>
#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use test_log::test;

    struct Counter {
        count: usize,
        notified: Emitter<Notified>,
    }

    #[async_trait]
    impl Actor for Counter {}

    #[derive(Message)]
    #[reply("usize")]
    struct Add(usize);

    #[async_trait]
    impl Handler<Add> for Counter {
        async fn handle(&mut self, msg: Add, _ctx: &mut Context<Self>) -> usize {
            self.count += msg.0;
            self.count
        }
    }

    #[derive(Message)]
    struct Notify;

    #[async_trait]
    impl Handler<Notify> for Counter {
        async fn handle(&mut self, _msg: Notify, _ctx: &mut Context<Self>) {
            self.notified.emit(Notified(self.count)).await;
        }
    }

    #[derive(Message)]
    struct NotifyLater(Duration);

    #[async_trait]
    impl Handler<NotifyLater> for Counter {
        async fn handle(&mut self, msg: NotifyLater, ctx: &mut Context<Self>) {
            let emitter: Emitter<Notify> = ctx.emitter();
            ctx.spawn_task(async move {
                tokio::time::sleep(msg.0).await;
                emitter.emit(Notify).await;
            });
        }
    }

    #[derive(Clone, Debug, Message, PartialEq)]
    struct Notified(usize);

    struct Sink(mpsc::UnboundedSender<Notified>);

    #[async_trait]
    impl Emit<Notified> for Sink {
        async fn emit(&self, msg: Notified) {
            let _ = self.0.send(msg);
        }
    }

    fn counter() -> (Counter, mpsc::UnboundedReceiver<Notified>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = Counter {
            count: 0,
            notified: Emitter::new(Sink(sender)),
        };
        (actor, receiver)
    }

    #[test(tokio::test)]
    async fn test_call() {
        let system = System::new();
        let (actor, _) = counter();
        let addr = system.spawn_actor(actor).await;
        assert_matches!(addr.call(Add(1)).await, Ok(1));
        assert_matches!(addr.call(Add(2)).await, Ok(3));
        let caller: Caller<Add> = addr.clone().into();
        assert_matches!(caller.call(Add(3)).await, Ok(6));
        system.stop();
    }

    #[test(tokio::test)]
    async fn test_emit() {
        let system = System::new();
        let (actor, mut notified) = counter();
        let addr = system.spawn_actor(actor).await;
        addr.emit(Notify).await;
        assert_eq!(notified.recv().await, Some(Notified(0)));
        addr.fire(Notify);
        assert_eq!(notified.recv().await, Some(Notified(0)));
        system.stop();
    }

    #[test(tokio::test)]
    async fn test_stop() {
        let system = System::new();
        let (actor, mut notified) = counter();
        let addr = system.spawn_actor(actor).await;
        addr.emit(NotifyLater(Duration::from_millis(100))).await;
        addr.emit(Stop).await;
        // The spawned task is cancelled together with the actor.
        assert_eq!(notified.recv().await, None);
        assert_matches!(addr.call(Add(1)).await, Err(_));
        system.stop();
    }

    #[test(tokio::test)]
    async fn test_emitter_registry() {
        let (sender1, mut receiver1) = mpsc::unbounded_channel();
        let (sender2, mut receiver2) = mpsc::unbounded_channel();

        let mut registry = EmitterRegistry::default();
        assert!(registry.is_empty());

        let id1 = registry.register(Emitter::new(Sink(sender1)));
        let id2 = registry.register(Emitter::new(Sink(sender2)));
        assert_ne!(id1, id2);
        assert_eq!(registry.len(), 2);

        registry.emit(Notified(1)).await;
        assert_eq!(receiver1.recv().await, Some(Notified(1)));
        assert_eq!(receiver2.recv().await, Some(Notified(1)));

        assert!(registry.unregister(id1));
        assert!(!registry.unregister(id1));
        registry.emit(Notified(2)).await;
        assert_eq!(receiver2.recv().await, Some(Notified(2)));
        assert_matches!(receiver1.try_recv(), Err(_));
    }
}
// </coverage:exclude>
