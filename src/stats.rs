/// Feed statistics tracking
///
/// Tracks chunk and byte rates, frame and message counts, resync and error
/// counts, and a rolling window of per-chunk processing latency.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

const WINDOW_SIZE: usize = 10000;

#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
}

#[derive(Debug, Clone)]
pub struct FeedStats {
    // Timing
    start_time: Option<Instant>,
    total_chunks: u64,
    total_bytes: u64,

    // Framing
    frames: u64,
    resync_bytes: u64,

    // Delivery
    messages: u64,
    codec_errors: u64,
    decode_errors: u64,

    // Chunk processing latencies (in microseconds)
    chunk_latencies: VecDeque<u64>,
}

impl FeedStats {
    pub fn new() -> Self {
        FeedStats {
            start_time: None,
            total_chunks: 0,
            total_bytes: 0,
            frames: 0,
            resync_bytes: 0,
            messages: 0,
            codec_errors: 0,
            decode_errors: 0,
            chunk_latencies: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Record a chunk received from the transport
    pub fn record_chunk(&mut self, size: usize) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
        self.total_chunks += 1;
        self.total_bytes += size as u64;
    }

    pub fn record_frames(&mut self, count: usize) {
        self.frames += count as u64;
    }

    pub fn record_resync(&mut self, skipped: u64) {
        self.resync_bytes += skipped;
    }

    pub fn record_message(&mut self) {
        self.messages += 1;
    }

    pub fn record_codec_error(&mut self) {
        self.codec_errors += 1;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    /// Record time spent turning one chunk into messages, in microseconds
    pub fn record_chunk_latency(&mut self, micros: u64) {
        if self.chunk_latencies.len() >= WINDOW_SIZE {
            self.chunk_latencies.pop_front();
        }
        self.chunk_latencies.push_back(micros);
    }

    /// Get messages per second
    pub fn messages_per_sec(&self) -> f64 {
        self.rate(self.messages)
    }

    /// Get bytes per second
    pub fn bytes_per_sec(&self) -> f64 {
        self.rate(self.total_bytes)
    }

    fn rate(&self, count: u64) -> f64 {
        match self.start_time {
            None => 0.0,
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    count as f64 / elapsed
                } else {
                    0.0
                }
            }
        }
    }

    /// Get chunk latency statistics
    pub fn chunk_latency_stats(&self) -> Option<LatencyStats> {
        if self.chunk_latencies.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.chunk_latencies.iter().copied().collect();
        sorted.sort_unstable();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        let p50 = sorted[sorted.len() / 2];
        let p99 = sorted[(sorted.len() * 99) / 100];

        Some(LatencyStats {
            min_us: min,
            max_us: max,
            mean_us: mean,
            p50_us: p50,
            p99_us: p99,
        })
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| st.elapsed())
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn resync_bytes(&self) -> u64 {
        self.resync_bytes
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn codec_errors(&self) -> u64 {
        self.codec_errors
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = FeedStats::new();
    }

    /// Log a statistics summary
    pub fn log_summary(&self) {
        info!(
            chunks = self.total_chunks,
            bytes = self.total_bytes,
            frames = self.frames,
            messages = self.messages,
            elapsed = ?self.elapsed(),
            msgs_per_sec = %format!("{:.2}", self.messages_per_sec()),
            bytes_per_sec = %format!("{:.2}", self.bytes_per_sec()),
            "feed statistics"
        );
        info!(
            resync_bytes = self.resync_bytes,
            codec_errors = self.codec_errors,
            decode_errors = self.decode_errors,
            "feed errors"
        );

        if let Some(stats) = self.chunk_latency_stats() {
            info!(
                min_us = stats.min_us,
                max_us = stats.max_us,
                mean_us = %format!("{:.2}", stats.mean_us),
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "chunk latency"
            );
        }
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}
