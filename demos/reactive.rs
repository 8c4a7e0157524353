use std::sync::{Arc, Mutex};

use json_parts_dataflow::{
    JsonParserError, SerdeDecoder, StreamingProcessor, Subscriber, Subscription,
};

#[derive(Debug, serde::Deserialize)]
struct Event {
    id: u32,
    kind: String,
}

struct Printer;

impl Subscriber<Event> for Printer {
    fn on_next(&self, item: Event) {
        println!("event #{}: {}", item.id, item.kind);
    }

    fn on_error(&self, error: JsonParserError) {
        eprintln!("stream failed: {}", error);
    }

    fn on_complete(&self) {
        println!("stream complete");
    }
}

/// Upstream that only records demand; chunks are pushed by hand below.
#[derive(Default)]
struct Demand(Mutex<u64>);

impl Subscription for Demand {
    fn request(&self, n: u64) {
        *self.0.lock().unwrap() += n;
        println!("  upstream asked for {} more", n);
    }

    fn cancel(&self) {
        println!("  upstream cancelled");
    }
}

fn main() {
    let processor = StreamingProcessor::new(SerdeDecoder::<Event>::new(), Printer);
    let demand = Arc::new(Demand::default());
    processor.on_subscribe(demand.clone());

    processor.request(1);
    // three events in one transport chunk: one delivered now, two buffered
    processor.on_next(Some(
        br#"[{"id":1,"kind":"start"},{"id":2,"kind":"tick"},{"id":3,"kind":"tick"}"#,
    ));
    println!("buffered: {}", processor.pending());

    processor.request(1);
    processor.request(1);
    // buffer drained, this one goes upstream
    processor.request(1);

    processor.on_next(Some(br#",{"id":4,"kind":"st"#));
    processor.on_next(Some(br#"op"}]"#));
    processor.on_complete();

    println!("total upstream demand: {}", demand.0.lock().unwrap());
}
