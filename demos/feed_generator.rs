/// Synthetic broadcast feed generator
///
/// Writes a stream of outer frames carrying touchline sub-messages, some as
/// plain text and some with a binary market record. Useful for replay tests
/// and benchmarking.
///
/// Usage: feed_generator [OUTPUT|stdout] [MESSAGE_COUNT]

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::{self, Write};

use market_feed::{FrameCodec, MarketDataRecord, ReassemblyBuffer};
use rand::Rng;
use tracing::info;

const SECS_1980_TO_2024: i32 = 1_388_534_400;

fn native_touchline<R: Rng>(rng: &mut R, token: u32, now: i32) -> Vec<u8> {
    let ltp = rng.gen_range(10_000u32..500_000);
    let spread = rng.gen_range(5u32..50);
    let record = MarketDataRecord {
        market_segment_id: 1,
        token,
        last_update_time: now,
        last_trade_time: now - rng.gen_range(0..30),
        last_traded_price: ltp,
        buy_quantity: rng.gen_range(1..5_000),
        buy_price: ltp - spread,
        sell_quantity: rng.gen_range(1..5_000),
        sell_price: ltp + spread,
        open_price: ltp - rng.gen_range(0..1_000),
        high_price: ltp + rng.gen_range(0..2_000),
        low_price: ltp - rng.gen_range(0..2_000),
        close_price: 0,
        decimal_locator: 2,
        previous_close_price: ltp - rng.gen_range(0..1_500),
        indicative_close_price: 0,
    };
    let mut msg = b"63=FT3.0|64=209|65=84|4=NSE|50=".to_vec();
    msg.extend_from_slice(&record.to_bytes());
    msg
}

fn text_touchline<R: Rng>(rng: &mut R, token: u32) -> Vec<u8> {
    format!(
        "63=FT3.0|64=209|65=84|1=1|7={}|8={}|399=2|",
        token,
        rng.gen_range(10_000u32..500_000)
    )
    .into_bytes()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let output_path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "/tmp/feed_generator.bin".to_string());
    let message_count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10_000);

    let mut output: Box<dyn Write> = if output_path == "stdout" {
        Box::new(io::stdout())
    } else {
        Box::new(File::create(&output_path)?)
    };

    let mut rng = rand::thread_rng();
    let mut clock = SECS_1980_TO_2024 + 9 * 3_600;
    let mut written = 0usize;
    let mut bytes = 0usize;
    let mut frames = 0usize;

    info!(count = message_count, path = %output_path, "generating feed");

    while written < message_count {
        let batch = rng.gen_range(1..=8).min(message_count - written);
        let subs: Vec<Vec<u8>> = (0..batch)
            .map(|_| {
                let token = rng.gen_range(1u32..5_000);
                if rng.gen_bool(0.7) {
                    native_touchline(&mut rng, token, clock)
                } else {
                    text_touchline(&mut rng, token)
                }
            })
            .collect();

        let frame = FrameCodec::wrap_sub_messages(&subs)?;
        output.write_all(&frame)?;

        written += batch;
        bytes += frame.len();
        frames += 1;
        clock += rng.gen_range(0..2);

        if frames % 1_000 == 0 {
            info!(messages = written, frames, "progress");
        }
    }
    output.flush()?;

    // sanity pass: the stream must reassemble into the frames just written
    if output_path != "stdout" {
        let data = std::fs::read(&output_path)?;
        let mut buf = ReassemblyBuffer::new();
        let mut check = 0usize;
        for chunk in data.chunks(1_460) {
            check += buf.push(chunk).into_iter().filter(|f| f.is_ok()).count();
        }
        info!(frames = check, leftover = buf.len(), "verified");
    }

    info!(messages = written, frames, bytes, "feed generation complete");
    Ok(())
}
