use std::time::Duration;
use tokio::time::Instant;

use super::MqttConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    /// No ping outstanding, waiting for the next send.
    Waiting,
    /// Ping sent, waiting for it to come back on `hassping`.
    AwaitingEcho,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    SendPing,
    /// Echo window closed without a reply. Carries the consecutive count.
    Missed(u32),
    /// Too many misses in a row. The counter has been reset.
    Reconnect,
}

/// Ping/echo bookkeeping for one connected session.
///
/// Pure state over [`Instant`]s so the worker decides when to sleep and the
/// timeline can be tested without a broker. With the defaults a silent
/// broker is detected 100 seconds after connecting: pings at 30, 60 and 90,
/// misses at 40, 70 and 100.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    window: Duration,
    max_missed: u32,
    missed: u32,
    next_ping: Instant,
    ack_deadline: Option<Instant>,
}

impl Heartbeat {
    pub fn new(interval: Duration, window: Duration, max_missed: u32, now: Instant) -> Self {
        Self {
            interval,
            window: window.min(interval),
            max_missed: max_missed.max(1),
            missed: 0,
            next_ping: now + interval,
            ack_deadline: None,
        }
    }

    pub fn from_config(config: &MqttConfig, now: Instant) -> Self {
        Self::new(
            config.ping_interval(),
            config.ping_window(),
            config.max_missed_pings(),
            now,
        )
    }

    pub fn phase(&self) -> HeartbeatPhase {
        match self.ack_deadline {
            Some(_) => HeartbeatPhase::AwaitingEcho,
            None => HeartbeatPhase::Waiting,
        }
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// The earliest instant at which [`poll`](Self::poll) has something to say.
    pub fn next_deadline(&self) -> Instant {
        match self.ack_deadline {
            Some(deadline) => deadline.min(self.next_ping),
            None => self.next_ping,
        }
    }

    /// Advances the timeline to `now`. Call repeatedly until `None`; an
    /// expired echo window is reported before a due ping.
    pub fn poll(&mut self, now: Instant) -> Option<HeartbeatEvent> {
        if let Some(deadline) = self.ack_deadline {
            if now >= deadline {
                self.ack_deadline = None;
                self.missed += 1;
                if self.missed >= self.max_missed {
                    self.missed = 0;
                    return Some(HeartbeatEvent::Reconnect);
                }
                return Some(HeartbeatEvent::Missed(self.missed));
            }
        }

        if now >= self.next_ping {
            self.ack_deadline = Some(now + self.window);
            self.next_ping += self.interval;
            if self.next_ping <= now {
                self.next_ping = now + self.interval;
            }
            return Some(HeartbeatEvent::SendPing);
        }

        None
    }

    /// Any message seen on the ping topic. Clears the miss counter.
    pub fn echo(&mut self) {
        self.ack_deadline = None;
        self.missed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn heartbeat(start: Instant) -> Heartbeat {
        Heartbeat::new(secs(30), secs(10), 3, start)
    }

    /// Polls every second from 1 to `until`, echoing at the given offsets.
    fn run(hb: &mut Heartbeat, start: Instant, until: u64, echoes: &[u64]) -> Vec<(u64, HeartbeatEvent)> {
        let mut events = Vec::new();
        for t in 1..=until {
            if echoes.contains(&t) {
                hb.echo();
            }
            while let Some(event) = hb.poll(start + secs(t)) {
                events.push((t, event));
            }
        }
        events
    }

    #[test]
    fn silent_broker_reconnects_after_third_miss() {
        let start = Instant::now();
        let mut hb = heartbeat(start);
        let events = run(&mut hb, start, 100, &[]);
        assert_eq!(
            events,
            vec![
                (30, HeartbeatEvent::SendPing),
                (40, HeartbeatEvent::Missed(1)),
                (60, HeartbeatEvent::SendPing),
                (70, HeartbeatEvent::Missed(2)),
                (90, HeartbeatEvent::SendPing),
                (100, HeartbeatEvent::Reconnect),
            ]
        );
        assert_eq!(hb.missed(), 0);
    }

    #[test]
    fn echo_resets_the_miss_counter() {
        let start = Instant::now();
        let mut hb = heartbeat(start);
        let events = run(&mut hb, start, 130, &[65]);
        assert!(events.contains(&(40, HeartbeatEvent::Missed(1))));
        assert!(!events.iter().any(|(_, e)| *e == HeartbeatEvent::Reconnect));
        assert!(!events.contains(&(70, HeartbeatEvent::Missed(2))));
        // after the echo at 65 counting starts over
        assert!(events.contains(&(100, HeartbeatEvent::Missed(1))));
        assert!(events.contains(&(130, HeartbeatEvent::Missed(2))));
    }

    #[test]
    fn answered_pings_never_miss() {
        let start = Instant::now();
        let mut hb = heartbeat(start);
        let events = run(&mut hb, start, 300, &[31, 61, 91, 121, 151, 181, 211, 241, 271]);
        assert!(events.iter().all(|(_, e)| *e == HeartbeatEvent::SendPing));
        assert_eq!(events.len(), 10);
    }

    #[test]
    fn phase_and_deadline_track_the_outstanding_ping() {
        let start = Instant::now();
        let mut hb = heartbeat(start);
        assert_eq!(hb.phase(), HeartbeatPhase::Waiting);
        assert_eq!(hb.next_deadline(), start + secs(30));

        assert_eq!(hb.poll(start + secs(30)), Some(HeartbeatEvent::SendPing));
        assert_eq!(hb.phase(), HeartbeatPhase::AwaitingEcho);
        assert_eq!(hb.next_deadline(), start + secs(40));

        hb.echo();
        assert_eq!(hb.phase(), HeartbeatPhase::Waiting);
        assert_eq!(hb.next_deadline(), start + secs(60));
    }

    #[test]
    fn window_equal_to_interval_reports_miss_before_next_ping() {
        let start = Instant::now();
        let mut hb = Heartbeat::new(secs(10), secs(10), 2, start);
        assert_eq!(hb.poll(start + secs(10)), Some(HeartbeatEvent::SendPing));
        assert_eq!(hb.poll(start + secs(20)), Some(HeartbeatEvent::Missed(1)));
        assert_eq!(hb.poll(start + secs(20)), Some(HeartbeatEvent::SendPing));
        assert_eq!(hb.poll(start + secs(20)), None);
    }
}
