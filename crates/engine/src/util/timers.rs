use std::collections::hash_map::{Entry, HashMap};
use std::hash::Hash;
use std::time::Duration;

use derive_where::derive_where;
use ractor::time::send_after;
use ractor::{ActorRef, Message, MessagingErr};
use tokio::task::JoinHandle;

/// Message sent to the owning actor when a timer fires.
///
/// Must be passed back to [`TimerScheduler::intercept_timer_msg`], which tells
/// whether the timer is still current.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeoutElapsed<Key> {
    key: Key,
    generation: u64,
}

impl<Key> TimeoutElapsed<Key> {
    pub fn key(&self) -> &Key {
        &self.key
    }
}

#[derive_where(Debug; Key)]
struct Timer<Key, Msg> {
    generation: u64,
    #[derive_where(skip)]
    task: JoinHandle<Result<(), MessagingErr<Msg>>>,
    key: Key,
}

/// Keyed one-shot timers delivering [`TimeoutElapsed`] messages to an actor.
///
/// Starting a timer under a key that is already active replaces it. Messages from
/// timers that were cancelled or replaced are recognized by their generation and
/// dropped by [`intercept_timer_msg`](Self::intercept_timer_msg), even if they were
/// already sitting in the actor's mailbox.
#[derive_where(Debug; Key)]
pub struct TimerScheduler<Key, Msg>
where
    Msg: Message,
{
    #[derive_where(skip)]
    actor_ref: ActorRef<Msg>,
    timers: HashMap<Key, Timer<Key, Msg>>,
    generation: u64,
}

impl<Key, Msg> TimerScheduler<Key, Msg>
where
    Key: Clone + Eq + Hash + Send + 'static,
    Msg: Message + From<TimeoutElapsed<Key>>,
{
    pub fn new(actor_ref: ActorRef<Msg>) -> Self {
        Self {
            actor_ref,
            timers: HashMap::new(),
            generation: 0,
        }
    }

    /// Start a timer that fires after `timeout`, replacing any timer under the same key.
    pub fn start_timer(&mut self, key: Key, timeout: Duration) {
        self.cancel(&key);

        self.generation += 1;
        let generation = self.generation;

        let task = {
            let key = key.clone();
            send_after(timeout, self.actor_ref.get_cell(), move || {
                TimeoutElapsed { key, generation }.into()
            })
        };

        self.timers.insert(
            key.clone(),
            Timer {
                generation,
                task,
                key,
            },
        );
    }

    pub fn is_timer_active(&self, key: &Key) -> bool {
        self.timers.contains_key(key)
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Cancel the timer under `key`, if any.
    pub fn cancel(&mut self, key: &Key) {
        if let Some(timer) = self.timers.remove(key) {
            timer.task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }

    /// Returns the key of the timer if it is still current, or `None` if it was
    /// cancelled or replaced after the message was sent.
    pub fn intercept_timer_msg(&mut self, msg: TimeoutElapsed<Key>) -> Option<Key> {
        match self.timers.entry(msg.key) {
            Entry::Vacant(_) => None,
            Entry::Occupied(entry) if entry.get().generation != msg.generation => None,
            Entry::Occupied(entry) => Some(entry.remove().key),
        }
    }
}

impl<Key, Msg> Drop for TimerScheduler<Key, Msg>
where
    Msg: Message,
{
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use ractor::{Actor, ActorProcessingErr};
    use tokio::sync::mpsc;

    use super::*;

    struct Probe;

    #[derive(Debug)]
    enum ProbeMsg {
        Start(&'static str, Duration),
        Cancel(&'static str),
        Elapsed(TimeoutElapsed<&'static str>),
    }

    impl From<TimeoutElapsed<&'static str>> for ProbeMsg {
        fn from(elapsed: TimeoutElapsed<&'static str>) -> Self {
            Self::Elapsed(elapsed)
        }
    }

    #[async_trait::async_trait]
    impl Actor for Probe {
        type Msg = ProbeMsg;
        type State = (TimerScheduler<&'static str, ProbeMsg>, mpsc::UnboundedSender<&'static str>);
        type Arguments = mpsc::UnboundedSender<&'static str>;

        async fn pre_start(
            &self,
            myself: ActorRef<ProbeMsg>,
            fired: Self::Arguments,
        ) -> Result<Self::State, ActorProcessingErr> {
            Ok((TimerScheduler::new(myself), fired))
        }

        async fn handle(
            &self,
            _myself: ActorRef<ProbeMsg>,
            msg: ProbeMsg,
            (timers, fired): &mut Self::State,
        ) -> Result<(), ActorProcessingErr> {
            match msg {
                ProbeMsg::Start(key, timeout) => timers.start_timer(key, timeout),
                ProbeMsg::Cancel(key) => timers.cancel(&key),
                ProbeMsg::Elapsed(elapsed) => {
                    if let Some(key) = timers.intercept_timer_msg(elapsed) {
                        fired.send(key)?;
                    }
                }
            }

            Ok(())
        }
    }

    #[tokio::test]
    async fn fires_cancels_and_replaces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (probe, handle) = Actor::spawn(None, Probe, tx).await.unwrap();

        let short = Duration::from_millis(20);

        probe.cast(ProbeMsg::Start("a", short)).unwrap();
        probe.cast(ProbeMsg::Start("b", short)).unwrap();
        probe.cast(ProbeMsg::Cancel("b")).unwrap();
        probe.cast(ProbeMsg::Start("c", short)).unwrap();
        probe.cast(ProbeMsg::Start("c", Duration::from_millis(80))).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first, second), ("a", "c"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());

        probe.stop(None);
        handle.await.unwrap();
    }
}
