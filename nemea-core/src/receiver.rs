use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::record::InboundRecord;
use crate::stats::Stats;

/// What one `recv` call on a [`RecordSource`] can report, mirroring §9's
/// "explicit sum-type return from the receive call" re-architecture of the
/// source's exception-as-control-flow pattern.
pub enum SourceEvent {
    Record(InboundRecord),
    /// Upstream schema changed; the source has already reloaded its decoder
    /// template and is handing back the re-decoded record.
    Renegotiated(InboundRecord),
    /// A record failed to decode; not fatal to the stream.
    Malformed(String),
    /// This channel's stream ended; only this reader stops.
    EndOfStream,
}

/// One logical input channel's decode loop (C1). Concrete transports
/// (TCP framing, file tailing, …) implement this; the retry/backoff and
/// cancellation behavior around it lives in [`run_receiver`] so every
/// channel gets the same failure handling.
#[async_trait]
pub trait RecordSource: Send {
    async fn recv(&mut self) -> SourceEvent;
}

/// Drives one receiver to completion: decodes records and pushes them onto
/// the shared bounded queue, backing off (by blocking on the bounded send)
/// rather than dropping when the queue is full, and checking the stop flag
/// cooperatively between receives (§4.1, §5).
pub async fn run_receiver(
    channel_name: &str,
    mut source: impl RecordSource,
    tx: Sender<InboundRecord>,
    stop: CancellationToken,
    stats: Arc<Stats>,
) {
    loop {
        if stop.is_cancelled() {
            tracing::info!(channel = channel_name, "receiver stopping on cancellation");
            return;
        }

        let event = tokio::select! {
            _ = stop.cancelled() => {
                tracing::info!(channel = channel_name, "receiver stopping on cancellation");
                return;
            }
            event = source.recv() => event,
        };

        match event {
            SourceEvent::Record(record) | SourceEvent::Renegotiated(record) => {
                // A full queue backs the reader off rather than dropping the
                // record; `send` blocks until a slot is free or the
                // receiving half is gone.
                if tx.send(record).await.is_err() {
                    tracing::warn!(channel = channel_name, "queue closed, receiver stopping");
                    return;
                }
            }
            SourceEvent::Malformed(reason) => {
                Stats::incr(&stats.records_malformed);
                tracing::warn!(channel = channel_name, reason, "dropping malformed record");
            }
            SourceEvent::EndOfStream => {
                tracing::info!(channel = channel_name, "upstream ended stream");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nemea_wire::ChannelId;

    struct ScriptedSource {
        events: std::collections::VecDeque<SourceEvent>,
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn recv(&mut self) -> SourceEvent {
            self.events.pop_front().unwrap_or(SourceEvent::EndOfStream)
        }
    }

    fn sample_record() -> InboundRecord {
        InboundRecord::Aggregated(nemea_wire::AggregatedBlacklistEvent {
            kind: nemea_wire::AggregatedKind::Ip,
            source: "10.0.0.1".into(),
            url_path: None,
            targets: vec![],
            source_ports: vec![],
            ts_first: chrono::Utc::now(),
            ts_last: chrono::Utc::now(),
            protocol: 6,
            blacklist_id: 1,
            bytes: 0,
            packets: 0,
            flows: 0,
            agg_win_minutes: 0,
        })
    }

    #[tokio::test]
    async fn malformed_records_are_counted_and_skipped() {
        let source = ScriptedSource {
            events: std::collections::VecDeque::from([
                SourceEvent::Malformed("bad utf8".into()),
                SourceEvent::Record(sample_record()),
                SourceEvent::EndOfStream,
            ]),
        };
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let stats = Arc::new(Stats::default());
        run_receiver("test", source, tx, CancellationToken::new(), stats.clone()).await;

        let received = rx.recv().await;
        assert!(received.is_some());
        assert_eq!(received.unwrap().channel(), ChannelId::AggregatedBlacklist);
        assert_eq!(stats.snapshot().records_malformed, 1);
    }
}
