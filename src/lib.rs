//! # JSON Parts Dataflow
//!
//! Incremental extraction of top-level JSON objects from a byte stream that
//! arrives in arbitrarily split chunks (server-sent events, chunked HTTP),
//! and a demand-aware forwarder that hands the decoded records to a
//! pull-based consumer one at a time.
//!
//! - [`JsonPartsExtractor`] turns chunks into complete `{ ... }` byte spans,
//!   keeping partial objects across calls and dropping everything else.
//! - [`PartDecoder`] turns one span into a record ([`SerdeDecoder`],
//!   [`ChatCompletionDecoder`], or any closure through [`decoder_fn`]).
//! - [`DemandForwarder`] buffers surplus records and only asks the upstream
//!   for more once its buffer is drained.
//! - [`PartsStream`] and [`StreamingProcessor`] wire the three together for
//!   `futures::Stream` consumers and for callback-driven publishers.
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use json_parts_dataflow::{ChannelSource, ParserConfig, PartsStream};
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, source) = ChannelSource::channel(10);
//!
//!     tokio::spawn(async move {
//!         let response = r#"[{"name": "Alice", "age": 30}, {"name": "Bob", "age": 25}]"#;
//!         for part in response.as_bytes().chunks(7) {
//!             tx.send(Some(part.to_vec())).await.unwrap();
//!         }
//!     });
//!
//!     let mut people = PartsStream::<_, json_parts_dataflow::SerdeDecoder<Person>>::deserialize(
//!         source,
//!         &ParserConfig::default(),
//!     );
//!     while let Some(person) = people.next().await {
//!         println!("Parsed person: {:?}", person?);
//!     }
//!     Ok(())
//! }
//! ```

#[cfg(test)]
mod tests;

mod extract_json;
pub use extract_json::*;

mod async_parser;
pub use async_parser::*;

mod decoder;
pub use decoder::*;

mod forwarder;
pub use forwarder::*;

mod processor;
pub use processor::*;

mod completion;
pub use completion::*;

mod reader;
pub use reader::*;

mod stream_adapter;
pub use stream_adapter::*;

#[cfg(feature = "configs")]
mod settings;
#[cfg(feature = "configs")]
pub use settings::*;

mod metrics;
#[cfg(feature = "metrics")]
pub use metrics::gather_metrics;
