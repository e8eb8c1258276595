//! Client scenarios against the scripted server.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use reqlink_transport::{
    ChannelClientHandler, ChannelRequestHandler, Client, ClientConfig, ClientError, ClientEvent,
    ClientHandler, ClientState, CodecError, FrameKind, JsonCodec, RequestEvent, RequestHandler,
    RequestState, Value, ValueCodec, WireError, serialize_frame,
};

use super::server::ScriptedServer;
use super::{ConnectMode, TestProviders, connect, next_event, run_local, test_address};

#[tokio::test]
async fn test_request_with_two_replies() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, mut events) = ChannelRequestHandler::new();

        let request = conn
            .client
            .submit(&Value::from("list"), handler)
            .expect("submit");
        assert_eq!(request.state(), RequestState::Queued);

        let (id, payload) = conn.server.read_request().await;
        assert_eq!(id, request.id());
        assert_eq!(payload, Value::from("list"));
        assert_eq!(next_event(&mut events).await, RequestEvent::Sent);
        assert_eq!(request.state(), RequestState::Sent);

        conn.server.reply(id, "a").await;
        conn.server.reply(id, "b").await;
        conn.server.finish(id, false).await;

        assert_eq!(
            next_event(&mut events).await,
            RequestEvent::Reply(Value::from("a"))
        );
        assert_eq!(
            next_event(&mut events).await,
            RequestEvent::Reply(Value::from("b"))
        );
        assert_eq!(
            next_event(&mut events).await,
            RequestEvent::Finished { is_error: false }
        );
        assert_eq!(request.state(), RequestState::Finished);

        let metrics = conn.client.metrics();
        assert_eq!(metrics.requests_submitted, 1);
        assert_eq!(metrics.requests_finished, 1);
        assert_eq!(metrics.frames_received, 3);
        assert_eq!(metrics.live_requests, 0);

        conn.client.close().expect("close");
        conn.server.expect_eof().await;
    })
    .await;
}

#[tokio::test]
async fn test_interleaved_replies_route_by_id() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (first_handler, mut first_events) = ChannelRequestHandler::new();
        let (second_handler, mut second_events) = ChannelRequestHandler::new();

        let first = conn
            .client
            .submit(&Value::from("first"), first_handler)
            .expect("submit");
        let second = conn
            .client
            .submit(&Value::from("second"), second_handler)
            .expect("submit");
        assert_ne!(first.id(), second.id());

        // Frames are written in submission order
        let (id_a, _) = conn.server.read_request().await;
        let (id_b, _) = conn.server.read_request().await;
        assert_eq!((id_a, id_b), (first.id(), second.id()));

        conn.server.reply(id_b, "to-second").await;
        conn.server.finish(id_b, true).await;
        conn.server.reply(id_a, "to-first").await;
        conn.server.finish(id_a, false).await;

        assert_eq!(next_event(&mut second_events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut second_events).await,
            RequestEvent::Reply(Value::from("to-second"))
        );
        assert_eq!(
            next_event(&mut second_events).await,
            RequestEvent::Finished { is_error: true }
        );

        assert_eq!(next_event(&mut first_events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut first_events).await,
            RequestEvent::Reply(Value::from("to-first"))
        );
        assert_eq!(
            next_event(&mut first_events).await,
            RequestEvent::Finished { is_error: false }
        );
    })
    .await;
}

#[tokio::test]
async fn test_submit_before_connected_is_rejected() {
    run_local(async {
        let (providers, _accepted) = TestProviders::new(ConnectMode::Hang);
        let (handler, _events) = ChannelClientHandler::new();
        let client = Client::connect(&providers, test_address(), ClientConfig::default(), handler)
            .expect("valid address");

        assert_eq!(client.state(), ClientState::Connecting);
        let (request_handler, _) = ChannelRequestHandler::new();
        let result = client.submit(&Value::from("early"), request_handler);
        assert_eq!(result.err(), Some(ClientError::NotConnected));
    })
    .await;
}

#[tokio::test]
async fn test_connect_refused_reports_error() {
    run_local(async {
        let (providers, _accepted) = TestProviders::new(ConnectMode::Refuse);
        let (handler, mut events) = ChannelClientHandler::new();
        let client = Client::connect(&providers, test_address(), ClientConfig::default(), handler)
            .expect("valid address");

        match next_event(&mut events).await {
            ClientEvent::Error(ClientError::ConnectFailed { address, .. }) => {
                assert_eq!(address, test_address().to_string());
            }
            other => panic!("expected connect failure, got {other:?}"),
        }
        assert_eq!(client.state(), ClientState::Failed);

        let (request_handler, _) = ChannelRequestHandler::new();
        let result = client.submit(&Value::from("x"), request_handler);
        assert_eq!(result.err(), Some(ClientError::Failed));
    })
    .await;
}

#[tokio::test]
async fn test_connect_timeout() {
    run_local(async {
        let (providers, _accepted) = TestProviders::new(ConnectMode::Hang);
        let (handler, mut events) = ChannelClientHandler::new();
        let config = ClientConfig::default().with_connect_timeout(Duration::from_millis(20));
        let client =
            Client::connect(&providers, test_address(), config, handler).expect("valid address");

        assert_eq!(
            next_event(&mut events).await,
            ClientEvent::Error(ClientError::ConnectTimeout {
                timeout: Duration::from_millis(20),
            })
        );
        assert_eq!(client.state(), ClientState::Failed);
    })
    .await;
}

#[tokio::test]
async fn test_invalid_address_rejected_synchronously() {
    run_local(async {
        let (providers, _accepted) = TestProviders::new(ConnectMode::Accept);
        let (handler, _events) = ChannelClientHandler::new();
        let result = Client::connect(
            &providers,
            reqlink_transport::ServerAddress::unix(""),
            ClientConfig::default(),
            handler,
        );
        assert!(matches!(result, Err(ClientError::InvalidAddress(_))));
    })
    .await;
}

#[tokio::test]
async fn test_server_hangup_fails_client_once() {
    run_local(async {
        let conn = connect(ClientConfig::default()).await;
        let super::Connected {
            client,
            mut events,
            mut server,
        } = conn;

        let (a_handler, mut a_events) = ChannelRequestHandler::new();
        let (b_handler, mut b_events) = ChannelRequestHandler::new();
        let a = client.submit(&Value::from("a"), a_handler).expect("submit a");
        let b = client.submit(&Value::from("b"), b_handler).expect("submit b");
        server.read_request().await;
        server.read_request().await;
        drop(server);

        assert_eq!(
            next_event(&mut events).await,
            ClientEvent::Error(ClientError::ConnectionClosed)
        );
        assert_eq!(client.state(), ClientState::Failed);

        // Without the failure cascade the requests just stop hearing back
        for (request, request_events) in [(&a, &mut a_events), (&b, &mut b_events)] {
            assert!(!request.is_terminal());
            assert_eq!(next_event(request_events).await, RequestEvent::Sent);
            assert!(request_events.try_recv().is_err());
        }

        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
        assert!(a_events.try_recv().is_err());
        assert!(b_events.try_recv().is_err());

        a.abort().expect("abort a after failure");
        b.abort().expect("abort b after failure");
        assert_eq!(client.outstanding_requests(), 0);
        client.close().expect("close after failure");
        assert_eq!(client.state(), ClientState::Closed);
    })
    .await;
}

#[tokio::test]
async fn test_frame_after_finished_is_not_delivered() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, mut events) = ChannelRequestHandler::new();
        let request = conn
            .client
            .submit(&Value::from("x"), handler)
            .expect("submit");

        let (id, _) = conn.server.read_request().await;
        conn.server.finish(id, false).await;
        assert_eq!(next_event(&mut events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut events).await,
            RequestEvent::Finished { is_error: false }
        );
        assert_eq!(request.state(), RequestState::Finished);

        // The id is no longer registered, so a stray reply is a protocol error
        conn.server.reply(id, "stray").await;
        assert_eq!(
            next_event(&mut conn.events).await,
            ClientEvent::Error(ClientError::UnknownRequest { request_id: id })
        );
        assert!(events.try_recv().is_err());
    })
    .await;
}

/// Records client and request callbacks into one ordered log.
struct LogHandler {
    name: &'static str,
    log: Rc<RefCell<Vec<String>>>,
}

impl ClientHandler for LogHandler {
    fn on_connected(&self) {
        self.log.borrow_mut().push(format!("{} connected", self.name));
    }

    fn on_error(&self, error: &ClientError) {
        self.log
            .borrow_mut()
            .push(format!("{} error: {error}", self.name));
    }
}

impl RequestHandler for LogHandler {
    fn on_sent(&self) {}

    fn on_reply(&self, reply: Value) {
        self.log
            .borrow_mut()
            .push(format!("{} reply {reply}", self.name));
    }

    fn on_finished(&self, is_error: bool) {
        self.log
            .borrow_mut()
            .push(format!("{} finished error={is_error}", self.name));
    }
}

#[tokio::test]
async fn test_failure_finishes_live_requests_before_error() {
    run_local(async {
        let (providers, mut accepted) = TestProviders::new(ConnectMode::Accept);
        let log = Rc::new(RefCell::new(Vec::new()));
        let client_handler = Rc::new(LogHandler {
            name: "client",
            log: log.clone(),
        });
        let config = ClientConfig::default().with_finish_requests_on_failure(true);
        let client = Client::connect(&providers, test_address(), config, client_handler)
            .expect("valid address");
        let mut server = ScriptedServer::new(next_event(&mut accepted).await);

        while client.state() == ClientState::Connecting {
            tokio::task::yield_now().await;
        }

        let first = client
            .submit(
                &Value::from("a"),
                Rc::new(LogHandler {
                    name: "first",
                    log: log.clone(),
                }),
            )
            .expect("submit");
        let second = client
            .submit(
                &Value::from("b"),
                Rc::new(LogHandler {
                    name: "second",
                    log: log.clone(),
                }),
            )
            .expect("submit");
        server.read_request().await;
        server.read_request().await;

        drop(server);
        while client.state() == ClientState::Connected {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *log.borrow(),
            vec![
                "client connected".to_string(),
                "first finished error=true".to_string(),
                "second finished error=true".to_string(),
                "client error: connection closed by peer".to_string(),
            ]
        );
        assert_eq!(first.state(), RequestState::Finished);
        assert_eq!(second.state(), RequestState::Finished);
        assert_eq!(client.outstanding_requests(), 0);
    })
    .await;
}

#[tokio::test]
async fn test_abort_after_send_discards_late_frames() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (aborted_handler, mut aborted_events) = ChannelRequestHandler::new();
        let (other_handler, mut other_events) = ChannelRequestHandler::new();

        let aborted = conn
            .client
            .submit(&Value::from("slow"), aborted_handler)
            .expect("submit");
        let (aborted_id, _) = conn.server.read_request().await;
        assert_eq!(next_event(&mut aborted_events).await, RequestEvent::Sent);

        aborted.abort().expect("abort");
        assert_eq!(aborted.state(), RequestState::Aborted);
        assert_eq!(
            aborted.abort(),
            Err(ClientError::RequestTerminated {
                request_id: aborted_id,
                state: RequestState::Aborted,
            })
        );

        let other = conn
            .client
            .submit(&Value::from("fast"), other_handler)
            .expect("submit");
        assert_ne!(other.id(), aborted_id);
        let (other_id, _) = conn.server.read_request().await;

        conn.server.reply(aborted_id, "late").await;
        conn.server.finish(aborted_id, false).await;
        conn.server.reply(other_id, "ok").await;
        conn.server.finish(other_id, false).await;

        assert_eq!(next_event(&mut other_events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut other_events).await,
            RequestEvent::Reply(Value::from("ok"))
        );
        assert_eq!(
            next_event(&mut other_events).await,
            RequestEvent::Finished { is_error: false }
        );

        assert!(aborted_events.try_recv().is_err());
        assert_eq!(conn.client.state(), ClientState::Connected);
        assert_eq!(conn.client.metrics().frames_discarded, 2);
        assert!(conn.events.try_recv().is_err());
    })
    .await;
}

#[tokio::test]
async fn test_finished_after_immediate_abort_is_ignored() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, mut events) = ChannelRequestHandler::new();

        let request = conn
            .client
            .submit(&Value::from("b"), handler)
            .expect("submit");
        let id = request.id();
        request.abort().expect("abort");
        assert_eq!(conn.client.outstanding_requests(), 0);

        conn.server.finish(id, false).await;

        // The connection keeps working, and the aborted frame was never written
        let (other_handler, mut other_events) = ChannelRequestHandler::new();
        let other = conn
            .client
            .submit(&Value::from("c"), other_handler)
            .expect("submit");
        assert_ne!(other.id(), id);
        let (other_id, payload) = conn.server.read_request().await;
        assert_eq!(other_id, other.id());
        assert_eq!(payload, Value::from("c"));

        conn.server.finish(other_id, false).await;
        assert_eq!(next_event(&mut other_events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut other_events).await,
            RequestEvent::Finished { is_error: false }
        );

        assert!(events.try_recv().is_err());
        assert!(conn.events.try_recv().is_err());
        assert_eq!(conn.client.state(), ClientState::Connected);
        assert_eq!(conn.client.metrics().frames_discarded, 1);

        conn.client.close().expect("close");
        conn.server.expect_eof().await;
    })
    .await;
}

#[tokio::test]
async fn test_abort_notifies_server_when_enabled() {
    run_local(async {
        let mut conn = connect(ClientConfig::default().with_notify_peer_on_abort(true)).await;
        let (handler, mut events) = ChannelRequestHandler::new();

        let request = conn
            .client
            .submit(&Value::from("work"), handler)
            .expect("submit");
        let (id, _) = conn.server.read_request().await;
        assert_eq!(next_event(&mut events).await, RequestEvent::Sent);

        request.abort().expect("abort");

        let frame = conn.server.read_frame().await;
        assert_eq!(frame.kind, FrameKind::Abort);
        assert_eq!(frame.request_id, id);
        assert!(frame.payload.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_dropping_live_request_aborts_it() {
    run_local(async {
        let conn = connect(ClientConfig::default()).await;
        let (handler, _events) = ChannelRequestHandler::new();

        let request = conn
            .client
            .submit(&Value::from("x"), handler)
            .expect("submit");
        assert_eq!(conn.client.outstanding_requests(), 1);

        drop(request);
        assert_eq!(conn.client.outstanding_requests(), 0);
        assert_eq!(conn.client.metrics().requests_aborted, 1);
        conn.client.close().expect("nothing outstanding");
    })
    .await;
}

#[tokio::test]
async fn test_close_requires_no_outstanding_requests() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, mut events) = ChannelRequestHandler::new();

        let request = conn
            .client
            .submit(&Value::from("x"), handler)
            .expect("submit");
        assert_eq!(
            conn.client.close(),
            Err(ClientError::RequestsOutstanding { count: 1 })
        );
        assert_eq!(conn.client.state(), ClientState::Connected);

        let (id, _) = conn.server.read_request().await;
        conn.server.finish(id, false).await;
        assert_eq!(next_event(&mut events).await, RequestEvent::Sent);
        assert_eq!(
            next_event(&mut events).await,
            RequestEvent::Finished { is_error: false }
        );
        assert!(request.is_terminal());

        conn.client.close().expect("close");
        assert_eq!(conn.client.state(), ClientState::Closed);
        assert_eq!(conn.client.close(), Err(ClientError::Closed));

        let (handler, _) = ChannelRequestHandler::new();
        assert_eq!(
            conn.client.submit(&Value::from("y"), handler).err(),
            Some(ClientError::Closed)
        );
        conn.server.expect_eof().await;
    })
    .await;
}

#[tokio::test]
async fn test_corrupted_frame_fails_client() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, _events) = ChannelRequestHandler::new();
        let _request = conn
            .client
            .submit(&Value::from("x"), handler)
            .expect("submit");
        let (id, _) = conn.server.read_request().await;

        let mut bytes = serialize_frame(id, FrameKind::Reply, b"\"ok\"").expect("serialize");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        conn.server.send_raw(&bytes).await;

        match next_event(&mut conn.events).await {
            ClientEvent::Error(ClientError::Wire(WireError::ChecksumMismatch { .. })) => {}
            other => panic!("expected checksum failure, got {other:?}"),
        }
        assert_eq!(conn.client.state(), ClientState::Failed);
    })
    .await;
}

#[tokio::test]
async fn test_frame_for_unknown_request_fails_client() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        conn.server.reply(77, "stray").await;

        assert_eq!(
            next_event(&mut conn.events).await,
            ClientEvent::Error(ClientError::UnknownRequest { request_id: 77 })
        );
        assert_eq!(conn.client.state(), ClientState::Failed);
    })
    .await;
}

#[tokio::test]
async fn test_undecodable_reply_fails_client() {
    run_local(async {
        let mut conn = connect(ClientConfig::default()).await;
        let (handler, _events) = ChannelRequestHandler::new();
        let _request = conn
            .client
            .submit(&Value::from("x"), handler)
            .expect("submit");
        let (id, _) = conn.server.read_request().await;

        let bytes = serialize_frame(id, FrameKind::Reply, b"not json").expect("serialize");
        conn.server.send_raw(&bytes).await;

        assert!(matches!(
            next_event(&mut conn.events).await,
            ClientEvent::Error(ClientError::Codec(_))
        ));
    })
    .await;
}

/// Submits a follow-up request from inside `on_finished`.
struct ChainingHandler {
    client: Rc<Client>,
    follow_up: RefCell<Option<reqlink_transport::Request>>,
    follow_up_handler: Rc<ChannelRequestHandler>,
}

impl RequestHandler for ChainingHandler {
    fn on_sent(&self) {}

    fn on_reply(&self, _reply: Value) {}

    fn on_finished(&self, _is_error: bool) {
        let request = self
            .client
            .submit(&Value::from("follow-up"), self.follow_up_handler.clone())
            .expect("submit from callback");
        *self.follow_up.borrow_mut() = Some(request);
    }
}

#[tokio::test]
async fn test_submit_from_callback() {
    run_local(async {
        let super::Connected {
            client,
            events: _events,
            mut server,
        } = connect(ClientConfig::default()).await;
        let client = Rc::new(client);

        let (follow_up_handler, mut follow_up_events) = ChannelRequestHandler::new();
        let chaining = Rc::new(ChainingHandler {
            client: client.clone(),
            follow_up: RefCell::new(None),
            follow_up_handler,
        });

        let _first = client
            .submit(&Value::from("first"), chaining.clone())
            .expect("submit");
        let (id, _) = server.read_request().await;
        server.finish(id, false).await;

        let (follow_up_id, payload) = server.read_request().await;
        assert_eq!(payload, Value::from("follow-up"));
        assert_eq!(next_event(&mut follow_up_events).await, RequestEvent::Sent);

        server.finish(follow_up_id, false).await;
        assert_eq!(
            next_event(&mut follow_up_events).await,
            RequestEvent::Finished { is_error: false }
        );

        assert!(chaining.follow_up.borrow().as_ref().is_some_and(|r| r.is_terminal()));
    })
    .await;
}

/// JSON codec that refuses to encode anything.
#[derive(Clone)]
struct RejectingCodec;

impl ValueCodec for RejectingCodec {
    fn encode(&self, _value: &Value) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("value not supported".into()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        JsonCodec.decode(bytes)
    }
}

#[tokio::test]
async fn test_encode_failure_is_returned_not_fatal() {
    run_local(async {
        let (providers, mut accepted) = TestProviders::new(ConnectMode::Accept);
        let (handler, mut events) = ChannelClientHandler::new();
        let client = Client::connect_with_codec(
            &providers,
            test_address(),
            ClientConfig::default(),
            RejectingCodec,
            handler,
        )
        .expect("valid address");
        let _server = next_event(&mut accepted).await;
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

        let (request_handler, _request_events) = ChannelRequestHandler::new();
        let result = client.submit(&Value::from("x"), request_handler);
        assert!(matches!(result, Err(ClientError::Encode(_))));

        assert_eq!(client.state(), ClientState::Connected);
        assert_eq!(client.outstanding_requests(), 0);
        assert!(events.try_recv().is_err());
        client.close().expect("close");
    })
    .await;
}
