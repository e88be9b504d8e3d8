//! Transport Module Tests
//!
//! Validates the wire record codec and the outbound client.
//!
//! ## Test Scopes
//! - **Codec**: exact record layout, byte order, rejection of garbled records.
//! - **Stream framing**: graceful close vs. short reads on in-memory duplex streams.
//! - **Client**: target validation, refused/silent peers, request/response round trips.

#[cfg(test)]
mod tests {
    use crate::cluster::types::{ProcessDirectory, SystemConfig};
    use crate::error::DsmError;
    use crate::transport::client::PeerTransport;
    use crate::transport::protocol::{
        HEADER_LEN, Message, decode, decode_header, encode, read_record, receive_message,
        record_len, write_message,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const BLOCK_SIZE: usize = 32;

    fn closed_port_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    fn transport_for(addrs: &[SocketAddr], local: usize, config: &SystemConfig) -> PeerTransport {
        let directory = Arc::new(ProcessDirectory::from_socket_addrs(addrs).unwrap());
        PeerTransport::new(local, directory, config)
    }

    fn small_config() -> SystemConfig {
        SystemConfig::default()
            .with_block_size(BLOCK_SIZE)
            .with_block_count(8)
            .with_connect_timeout(Duration::from_millis(500))
            .with_io_timeout(Duration::from_millis(300))
    }

    // ============================================================
    // CODEC TESTS
    // ============================================================

    #[test]
    fn test_record_has_fixed_size() {
        for msg in [
            Message::RequestBlock { block_id: 1 },
            Message::InvalidateBlock { block_id: 2 },
            Message::AckInvalidate { block_id: 3 },
            Message::ProtocolError { block_id: 4 },
            Message::ResponseBlock {
                block_id: 5,
                payload: vec![1u8; BLOCK_SIZE],
            },
        ] {
            let record = encode(&msg, BLOCK_SIZE).unwrap();
            assert_eq!(record.len(), HEADER_LEN + BLOCK_SIZE, "{} has wrong size", msg);
        }
    }

    #[test]
    fn test_header_is_big_endian() {
        let msg = Message::ResponseBlock {
            block_id: 0x0102_0304,
            payload: vec![0xEE; 3],
        };
        let record = encode(&msg, BLOCK_SIZE).unwrap();

        assert_eq!(&record[0..4], &[0, 0, 0, 2]);
        assert_eq!(&record[4..8], &[1, 2, 3, 4]);
        assert_eq!(&record[8..12], &[0, 0, 0, 3]);
        assert_eq!(&record[12..15], &[0xEE, 0xEE, 0xEE]);
        assert!(record[15..].iter().all(|&b| b == 0), "payload field is zero padded");
    }

    #[test]
    fn test_decode_response_keeps_payload_prefix_only() {
        let msg = Message::ResponseBlock {
            block_id: 7,
            payload: b"abc".to_vec(),
        };
        let record = encode(&msg, BLOCK_SIZE).unwrap();

        assert_eq!(decode(&record, BLOCK_SIZE).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let mut record = encode(&Message::RequestBlock { block_id: 6 }, BLOCK_SIZE).unwrap();
        record[3] = 42;

        let err = decode(&record, BLOCK_SIZE).unwrap_err();
        assert!(matches!(err, DsmError::Protocol(_)));
        // The header is still readable, so a server can echo the block id back.
        assert_eq!(decode_header(&record).unwrap().block_id, 6);
    }

    #[test]
    fn test_decode_rejects_oversized_payload_length() {
        let mut record = encode(&Message::RequestBlock { block_id: 0 }, BLOCK_SIZE).unwrap();
        record[8..12].copy_from_slice(&(BLOCK_SIZE as i32 + 1).to_be_bytes());

        assert!(matches!(
            decode(&record, BLOCK_SIZE),
            Err(DsmError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_negative_block_id() {
        let mut record = encode(&Message::InvalidateBlock { block_id: 0 }, BLOCK_SIZE).unwrap();
        record[4..8].copy_from_slice(&(-1i32).to_be_bytes());

        assert!(matches!(
            decode(&record, BLOCK_SIZE),
            Err(DsmError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_record_size() {
        let record = encode(&Message::RequestBlock { block_id: 0 }, BLOCK_SIZE).unwrap();

        assert!(decode(&record[..record.len() - 1], BLOCK_SIZE).is_err());
        assert!(decode(&record, BLOCK_SIZE * 2).is_err());
    }

    #[test]
    fn test_encode_rejects_payload_larger_than_block() {
        let msg = Message::ResponseBlock {
            block_id: 0,
            payload: vec![0u8; BLOCK_SIZE + 1],
        };

        assert!(matches!(
            encode(&msg, BLOCK_SIZE),
            Err(DsmError::Protocol(_))
        ));
    }

    // ============================================================
    // STREAM FRAMING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_stream_message_exchange() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let msg = Message::ResponseBlock {
            block_id: 3,
            payload: vec![9u8; BLOCK_SIZE],
        };

        write_message(&mut client, &msg, BLOCK_SIZE).await.unwrap();
        let received = receive_message(&mut server, BLOCK_SIZE).await.unwrap();

        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn test_zero_byte_read_is_peer_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = read_record(&mut server, BLOCK_SIZE).await.unwrap_err();
        assert!(matches!(err, DsmError::PeerClosed));
    }

    #[tokio::test]
    async fn test_partial_record_is_transport_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0u8; 5]).await.unwrap();
        drop(client);

        let err = read_record(&mut server, BLOCK_SIZE).await.unwrap_err();
        assert!(matches!(err, DsmError::Transport(_)));
    }

    #[tokio::test]
    async fn test_record_split_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(8);
        let record = encode(&Message::InvalidateBlock { block_id: 2 }, BLOCK_SIZE).unwrap();

        let writer = tokio::spawn(async move {
            for chunk in record.chunks(5) {
                client.write_all(chunk).await.unwrap();
            }
        });

        let received = read_record(&mut server, BLOCK_SIZE).await.unwrap();
        writer.await.unwrap();

        assert_eq!(received.len(), record_len(BLOCK_SIZE));
        assert_eq!(
            decode(&received, BLOCK_SIZE).unwrap(),
            Message::InvalidateBlock { block_id: 2 }
        );
    }

    // ============================================================
    // CLIENT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_send_to_self_is_invalid_target() {
        let config = small_config();
        let transport = transport_for(&[closed_port_addr(), closed_port_addr()], 0, &config);

        let err = transport
            .notify(0, &Message::InvalidateBlock { block_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, DsmError::InvalidTarget { target: 0, .. }));
    }

    #[tokio::test]
    async fn test_send_out_of_range_is_invalid_target() {
        let config = small_config();
        let transport = transport_for(&[closed_port_addr(), closed_port_addr()], 0, &config);

        let err = transport
            .notify(2, &Message::InvalidateBlock { block_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, DsmError::InvalidTarget { target: 2, .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_peer_unavailable() {
        let config = small_config();
        let transport = transport_for(&[closed_port_addr(), closed_port_addr()], 0, &config);

        let err = transport
            .notify(1, &Message::InvalidateBlock { block_id: 1 })
            .await
            .unwrap_err();
        assert!(err.is_peer_unavailable(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let config = small_config();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let msg = receive_message(&mut stream, BLOCK_SIZE).await.unwrap();
            assert_eq!(msg, Message::RequestBlock { block_id: 1 });
            let reply = Message::ResponseBlock {
                block_id: 1,
                payload: vec![0x42; BLOCK_SIZE],
            };
            write_message(&mut stream, &reply, BLOCK_SIZE).await.unwrap();
        });

        let transport = transport_for(&[closed_port_addr(), peer_addr], 0, &config);
        let reply = transport
            .request(1, &Message::RequestBlock { block_id: 1 })
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(
            reply,
            Message::ResponseBlock {
                block_id: 1,
                payload: vec![0x42; BLOCK_SIZE]
            }
        );
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_as_unavailable() {
        let config = small_config();
        // Bound but never accepted: the connect completes through the backlog,
        // the reply never comes.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap();

        let transport = transport_for(&[closed_port_addr(), peer_addr], 0, &config);
        let err = transport
            .request(1, &Message::RequestBlock { block_id: 1 })
            .await
            .unwrap_err();

        assert!(err.is_peer_unavailable(), "got {:?}", err);
        drop(listener);
    }

    #[tokio::test]
    async fn test_peer_closing_without_reply_is_peer_closed() {
        let config = small_config();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = receive_message(&mut stream, BLOCK_SIZE).await.unwrap();
            // Close without answering.
        });

        let transport = transport_for(&[closed_port_addr(), peer_addr], 0, &config);
        let err = transport
            .request(1, &Message::RequestBlock { block_id: 1 })
            .await
            .unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, DsmError::PeerClosed), "got {:?}", err);
    }
}
