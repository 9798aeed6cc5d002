use log::info;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use xseq::{AsyncEnumerable, AsyncSequenceExt, ContinuationContext, ContinuationOptions};

const VALUE_COUNT: u64 = 1_000_000;
const GROUP_COUNT: u64 = 16;

fn counter(limit: u64) -> AsyncEnumerable<u64> {
    AsyncEnumerable::create(move |mut writer, _token| async move {
        for i in 0..limit {
            writer.yield_async(i).await?;
        }
        Ok(())
    })
}

async fn drain(label: &str, options: ContinuationOptions) -> xseq::Result<()> {
    let mut enumerator = counter(VALUE_COUNT)
        .configure_await(options)
        .with_cancelation(CancellationToken::new())
        .get_async_enumerator();

    info!("Draining {} values ({})...", VALUE_COUNT, label);
    let start = Instant::now();
    let mut sum = 0u64;
    while enumerator.move_next().await? {
        sum += enumerator.take_current()?;
    }
    enumerator.dispose().await?;
    let elapsed = start.elapsed();
    let speed = VALUE_COUNT as f64 / elapsed.as_secs_f64();

    info!("=== {} Complete ===", label);
    info!("Checksum: {}", sum);
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());
    info!("Speed: {:.0} values/s", speed);
    Ok(())
}

#[tokio::main]
async fn main() -> xseq::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    drain("inline", ContinuationOptions::default()).await?;
    drain(
        "background",
        ContinuationOptions::new().with_context(ContinuationContext::Background),
    )
    .await?;

    info!("Grouping {} values into {} keys...", VALUE_COUNT, GROUP_COUNT);
    let start = Instant::now();
    let groups = counter(VALUE_COUNT)
        .aggregate_by(|n| n % GROUP_COUNT, 0u64, |acc, _| acc + 1)
        .to_dictionary_with_elements_async(|(k, _)| *k, |(_, n)| n)
        .await?;
    let elapsed = start.elapsed();

    info!("=== Grouping Complete ===");
    info!("Keys: {}, per key: {:?}", groups.len(), groups.get(&0));
    info!("Time: {:.2} seconds", elapsed.as_secs_f64());

    info!("Benchmark finished");
    Ok(())
}
