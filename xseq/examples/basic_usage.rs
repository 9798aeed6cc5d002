//! Basic usage example demonstrating xseq sequences.
//!
//! This example shows how to:
//! - Write a generator with `AsyncEnumerable::create`
//! - Pull values with an enumerator and dispose it
//! - Run the producer on a background task
//! - Chain query operators
//!
//! Run with: cargo run --example basic_usage

use xseq::{
    AsyncEnumerable, AsyncSequenceExt, CancellationToken, ContinuationContext, ToAsyncEnumerable,
};

fn squares(limit: u32) -> AsyncEnumerable<u32> {
    AsyncEnumerable::create(move |mut writer, _token| async move {
        for i in 1..=limit {
            writer.yield_async(i * i).await?;
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> xseq::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== xseq Basic Usage Example ===\n");

    // Example 1: pulling values by hand
    println!("1. Enumerator:");
    let mut e = squares(5).get_async_enumerator(CancellationToken::new());
    while e.move_next().await? {
        println!("   value: {}", e.current()?);
    }
    e.dispose().await?;
    println!("   state after dispose: {:?}\n", e.state());

    // Example 2: stopping early still runs the generator's cleanup
    println!("2. Early dispose:");
    let mut e = squares(1_000).get_async_enumerator(CancellationToken::new());
    e.move_next().await?;
    println!("   first value: {}", e.take_current()?);
    e.dispose().await?;
    println!("   disposed after one value\n");

    // Example 3: background producer
    println!("3. Background producer:");
    let total: u32 = squares(10)
        .configure_await(ContinuationContext::Background)
        .to_vec_async()
        .await?
        .into_iter()
        .sum();
    println!("   sum of squares 1..=10: {}\n", total);

    // Example 4: operators
    println!("4. Operators:");
    let words = vec!["apple", "avocado", "banana", "blueberry", "cherry"];
    let counts = words
        .to_async_enumerable()
        .aggregate_by(|w| w.chars().next(), 0u32, |n, _| n + 1)
        .to_dictionary_with_elements_async(|(c, _)| *c, |(_, n)| n)
        .await?;
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort();
    println!("   words per initial: {:?}", counts);

    let letters = vec!["ab", "cd"]
        .to_async_enumerable()
        .select_many(|s| s.chars().collect::<Vec<_>>().to_async_enumerable())
        .to_vec_async()
        .await?;
    println!("   flattened: {:?}", letters);

    println!("\n=== Example Complete ===");
    Ok(())
}
