#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use futures::{stream, Stream, StreamExt};
    use tokio::io::BufReader;
    use tokio::time::{sleep, Duration};

    use crate::{
        decoder_fn, reader_chunks, ChannelSource, ChunkDecoder, JsonParserError, ParserConfig,
        PartsStream, SerdeDecoder,
    };

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    fn person(name: &str, age: u32) -> Person {
        Person {
            name: name.into(),
            age,
        }
    }

    fn people<S>(upstream: S) -> PartsStream<S, SerdeDecoder<Person>> {
        PartsStream::deserialize(upstream, &ParserConfig::default())
    }

    /// Counts how many times the upstream is asked for a chunk.
    struct CountingStream<S> {
        inner: S,
        polls: Arc<AtomicUsize>,
    }

    impl<S> CountingStream<S> {
        fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
            let polls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    inner,
                    polls: polls.clone(),
                },
                polls,
            )
        }
    }

    impl<S: Stream + Unpin> Stream for CountingStream<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    #[tokio::test]
    async fn test_surplus_records_served_without_upstream_requests() {
        let chunk = br#"[{"name":"Alice","age":30},{"name":"Bob","age":25},{"name":"Carol","age":41}]"#;
        let (upstream, polls) =
            CountingStream::new(stream::iter(vec![Ok::<_, JsonParserError>(chunk.to_vec())]));
        let mut parts = people(upstream);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(parts.pending(), 2);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Bob", 25));
        assert_eq!(parts.next().await.unwrap().unwrap(), person("Carol", 41));
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        assert!(parts.next().await.is_none());
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_and_absent_chunks_pull_again() {
        let chunks: Vec<Result<Option<&[u8]>, JsonParserError>> = vec![
            Ok(None),
            Ok(Some(&b""[..])),
            Ok(Some(&br#"[{"na"#[..])),
            Ok(Some(&br#"me":"Alice","age":30}"#[..])),
            Ok(Some(&b"]"[..])),
        ];
        let (upstream, polls) = CountingStream::new(stream::iter(chunks));
        let mut parts = people(upstream);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_ends_stream() {
        let chunks = vec![
            Ok::<_, JsonParserError>(r#"{"name":"Alice","age":30}"#),
            Ok(r#"{"name":"Bob","age":"old"}"#),
            Ok(r#"{"name":"Carol","age":41}"#),
        ];
        let mut parts = people(stream::iter(chunks));

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        assert!(matches!(parts.next().await, Some(Err(JsonParserError::Json(_)))));
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_drops_rest_of_chunk() {
        let chunk = r#"{"name":"Alice","age":30}{"name":"Bob"}"#;
        let mut parts = people(stream::iter(vec![Ok::<_, JsonParserError>(chunk)]));

        assert!(matches!(parts.next().await, Some(Err(JsonParserError::Json(_)))));
        assert_eq!(parts.pending(), 0);
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let chunks = vec![
            Ok(r#"{"name":"Alice","age":30}"#),
            Err(JsonParserError::Transport("connection reset".into())),
            Ok(r#"{"name":"Bob","age":25}"#),
        ];
        let mut parts = people(stream::iter(chunks));

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        match parts.next().await {
            Some(Err(JsonParserError::Transport(msg))) => assert_eq!(msg, "connection reset"),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unterminated_object_dropped_at_end() {
        let chunks = vec![Ok::<_, JsonParserError>(r#"{"name":"Alice","age":30} {"name":"#)];
        let mut parts = people(stream::iter(chunks));

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        assert!(parts.next().await.is_none());
    }

    #[tokio::test]
    async fn test_buffer_limit_exceeded() {
        let config = ParserConfig {
            max_buffer_size: Some(16),
            ..Default::default()
        };
        let chunks = vec![
            Ok::<_, JsonParserError>(r#"{"name":"A","age":1}"#),
            Ok(r#"{"name":"this object never ends"#),
        ];
        let mut parts: PartsStream<_, SerdeDecoder<Person>> =
            PartsStream::deserialize(stream::iter(chunks), &config);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("A", 1));
        assert!(matches!(
            parts.next().await,
            Some(Err(JsonParserError::BufferLimitExceeded { limit: 16 }))
        ));
        assert!(parts.next().await.is_none());
    }

    #[test]
    fn test_buffer_limit_keeps_records_completed_in_same_chunk() {
        let config = ParserConfig {
            max_buffer_size: Some(8),
            ..Default::default()
        };
        let mut decoder: ChunkDecoder<SerdeDecoder<simd_json::OwnedValue>> =
            ChunkDecoder::new(SerdeDecoder::new(), &config);

        let records = decoder.decode_chunk(Some(br#"{"id":1}{"id":2222222222"#)).unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            decoder.decode_chunk(None),
            Err(JsonParserError::BufferLimitExceeded { limit: 8 })
        ));
        assert!(decoder.take_overflow().is_none());
    }

    #[tokio::test]
    async fn test_buffer_limit_after_record_in_same_chunk() {
        let config = ParserConfig {
            max_buffer_size: Some(16),
            ..Default::default()
        };
        let (upstream, polls) = CountingStream::new(stream::iter(vec![
            Ok::<_, JsonParserError>(r#"{"name":"A","age":1}{"name":"this object never ends"#),
            Ok(r#"{"name":"B","age":2}"#),
        ]));
        let mut parts: PartsStream<_, SerdeDecoder<Person>> =
            PartsStream::deserialize(upstream, &config);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("A", 1));
        assert!(matches!(
            parts.next().await,
            Some(Err(JsonParserError::BufferLimitExceeded { limit: 16 }))
        ));
        assert!(parts.next().await.is_none());
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decoder_skipping_records_pulls_again() {
        // keep only adults
        let decoder = decoder_fn(|part: &[u8]| {
            let mut buffer = part.to_vec();
            let person: Person = simd_json::from_slice(&mut buffer)?;
            Ok((person.age >= 18).then_some(person))
        });
        let chunks = vec![
            Ok::<_, JsonParserError>(r#"{"name":"Kid","age":9}"#),
            Ok(r#"{"name":"Teen","age":15}"#),
            Ok(r#"{"name":"Alice","age":30}"#),
        ];
        let (upstream, polls) = CountingStream::new(stream::iter(chunks));
        let mut parts = PartsStream::new(upstream, decoder);

        assert_eq!(parts.next().await.unwrap().unwrap(), person("Alice", 30));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_channel_source_delayed_chunks() {
        let (tx, source) = ChannelSource::channel(4);
        let json = r#"[{"name":"Zoë 😊","age":30},{"name":"Bob","age":25}]"#.as_bytes().to_vec();
        // split in the middle of the emoji
        let split = json.iter().position(|&b| b == 0xF0).unwrap() + 2;

        tokio::spawn(async move {
            tx.send(Some(json[..split].to_vec())).await.unwrap();
            tx.send(None).await.unwrap();
            sleep(Duration::from_millis(50)).await;
            tx.send(Some(json[split..].to_vec())).await.unwrap();
        });

        let results: Vec<Person> = people(source)
            .map(|result| result.unwrap())
            .collect()
            .await;
        assert_eq!(results, vec![person("Zoë 😊", 30), person("Bob", 25)]);
    }

    #[tokio::test]
    async fn test_reader_chunks_small_reads() {
        let data = r#"Some header text...
        {"name": "Alice", "age": 30}
        {"name": "Bob", "age": 25}
        Some footer text."#;
        let config = ParserConfig {
            buffer_size: 5,
            ..Default::default()
        };
        let reader = BufReader::new(Cursor::new(data.as_bytes().to_vec()));
        let chunks = reader_chunks(reader, &config);
        let chunks = Box::pin(chunks);

        let results: Vec<Person> = PartsStream::<_, SerdeDecoder<Person>>::deserialize(chunks, &config)
            .map(|result| result.unwrap())
            .collect()
            .await;
        assert_eq!(results, vec![person("Alice", 30), person("Bob", 25)]);
    }

    #[tokio::test]
    async fn test_reader_chunks_respect_buffer_size() {
        let config = ParserConfig {
            buffer_size: 4,
            ..Default::default()
        };
        let chunks: Vec<_> = reader_chunks(Cursor::new(b"0123456789".to_vec()), &config)
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.len()).collect();
        assert_eq!(lengths, vec![4, 4, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_chunks_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let config = ParserConfig {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let chunks = Box::pin(reader_chunks(client, &config));
        let mut parts: PartsStream<_, SerdeDecoder<Person>> =
            PartsStream::deserialize(chunks, &config);

        assert!(matches!(parts.next().await, Some(Err(JsonParserError::Timeout))));
        assert!(parts.next().await.is_none());
    }
}
