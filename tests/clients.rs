//! Async client tests over the mock transport.
//!
//! The tokio clock is paused: whenever every task is waiting, time jumps to
//! the next timer, so multi-second protocol timeouts run instantly.

#![cfg(feature = "std")]

use core::net::SocketAddrV4;
use core::ops::ControlFlow;

use knx_ip_client::client::{RoutingClient, TunnelClient};
use knx_ip_client::config::{RoutingConfig, TunnelConfig};
use knx_ip_client::net::mock_transport::{MockTransport, MOCK_GATEWAY};
use knx_ip_client::net::transport::AsyncTransport;
use knx_ip_client::protocol::cemi::CemiMessage;
use knx_ip_client::protocol::constants::{CemiService, E_NO_MORE_CONNECTIONS};
use knx_ip_client::protocol::frame::Hpai;
use knx_ip_client::protocol::routing::Router;
use knx_ip_client::protocol::services::{
    decode_frame, encode_frame, ChannelRequest, ChannelResponse, ConnectResponse, Frame, RoutingBusy, TunnelingAck,
    TunnelingRequest,
};
use knx_ip_client::protocol::tunnel::{ConnectionState, TunnelEvent};
use knx_ip_client::{GroupAddress, IndividualAddress, TunnelFailure};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn me() -> IndividualAddress {
    IndividualAddress::from_parts(1, 1, 250)
}

fn frame_bytes(frame: &Frame) -> Vec<u8> {
    encode_frame(frame).unwrap().to_vec()
}

fn accept(channel_id: u8) -> Vec<u8> {
    frame_bytes(&Frame::ConnectResponse(ConnectResponse::accepted(channel_id, Hpai::NAT, me())))
}

fn sent_frames(mock: &MockTransport) -> Vec<(Frame, SocketAddrV4)> {
    mock.sent_packets()
        .into_iter()
        .map(|(bytes, to)| (decode_frame(&bytes).unwrap(), to))
        .collect()
}

fn tunnel_client(mock: &MockTransport) -> TunnelClient<MockTransport> {
    init_logging();
    TunnelClient::new(mock.clone(), TunnelConfig::new(MOCK_GATEWAY))
}

async fn connected_client(mock: &MockTransport, channel_id: u8) -> TunnelClient<MockTransport> {
    let mut client = tunnel_client(mock);
    mock.add_response(accept(channel_id));
    assert_eq!(client.connect_and_wait().await.unwrap(), channel_id);
    mock.clear_sent();
    client
}

// =============================================================================
// Tunnelling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_and_wait() {
    let mock = MockTransport::new();
    let client = connected_client(&mock, 5).await;
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.connection().assigned_address(), Some(me()));
}

#[tokio::test(start_paused = true)]
async fn test_connect_refused() {
    let mock = MockTransport::new();
    let mut client = tunnel_client(&mock);
    mock.add_response(frame_bytes(&Frame::ConnectResponse(ConnectResponse::refused(
        E_NO_MORE_CONNECTIONS,
    ))));

    let err = client.connect_and_wait().await.unwrap_err();
    assert!(err.is_refused());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(mock.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let mock = MockTransport::new();
    let mut client = tunnel_client(&mock);

    let started = tokio::time::Instant::now();
    let err = client.connect_and_wait().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() >= std::time::Duration::from_millis(5000));
    assert_eq!(mock.close_count(), 1);

    let frames = sent_frames(&mock);
    assert_eq!(frames.len(), 1);
    assert!(matches!(frames[0], (Frame::ConnectRequest(_), to) if to == MOCK_GATEWAY));
}

#[tokio::test(start_paused = true)]
async fn test_inbound_indication_is_acked() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;

    let cemi = CemiMessage::group_write(CemiService::Indication, IndividualAddress::from(0x1101), GroupAddress::from(2563), &[0x01])
        .unwrap();
    mock.add_response(frame_bytes(&Frame::TunnelingRequest(TunnelingRequest::new(5, 0, cemi.clone()))));

    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Indication(cemi));
    assert_eq!(
        sent_frames(&mock),
        vec![(Frame::TunnelingAck(TunnelingAck::new(5, 0, 0)), MOCK_GATEWAY)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_writes_are_serialized() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;

    client.write(me(), GroupAddress::from(1), &[0x01]).await.unwrap();
    client.write(me(), GroupAddress::from(1), &[0x00]).await.unwrap();
    assert_eq!(mock.sent_packets().len(), 1);

    mock.add_response(frame_bytes(&Frame::TunnelingAck(TunnelingAck::new(5, 0, 0))));
    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Ack { sequence: 0 });

    let frames = sent_frames(&mock);
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[1].0, Frame::TunnelingRequest(r) if r.sequence == 1));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;
    client.write(me(), GroupAddress::from(1), &[0x01]).await.unwrap();

    assert_eq!(
        client.next_event().await.unwrap(),
        TunnelEvent::Error(TunnelFailure::RetriesExhausted { sequence: 0 })
    );
    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Disconnecting);
    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Disconnected { status: 0 });
    assert!(client.next_event().await.is_err());

    let frames = sent_frames(&mock);
    let requests = frames
        .iter()
        .filter(|(frame, _)| matches!(frame, Frame::TunnelingRequest(r) if r.sequence == 0))
        .count();
    // original plus three retransmissions
    assert_eq!(requests, 4);
    assert!(matches!(frames.last(), Some((Frame::DisconnectRequest(_), _))));
    assert_eq!(mock.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_connection() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;

    // run past the first heartbeat, answering it from a helper task
    let gateway = mock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        gateway.add_response(frame_bytes(&Frame::ConnectionStateResponse(ChannelResponse::new(5, 0))));
        // second heartbeat goes out at 121 s
        tokio::time::sleep(std::time::Duration::from_secs(62)).await;
        let cemi = CemiMessage::group_read(CemiService::Indication, IndividualAddress::from(0x1101), GroupAddress::from(7));
        gateway.add_response(frame_bytes(&Frame::TunnelingRequest(TunnelingRequest::new(5, 0, cemi))));
    });

    assert!(matches!(client.next_event().await.unwrap(), TunnelEvent::Indication(_)));
    assert_eq!(client.state(), ConnectionState::Connected);
    let heartbeats = sent_frames(&mock)
        .into_iter()
        .filter(|(frame, _)| matches!(frame, Frame::ConnectionStateRequest(_)))
        .count();
    assert_eq!(heartbeats, 2);
}

#[tokio::test(start_paused = true)]
async fn test_peer_disconnect() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;

    let mut request = ChannelRequest::new(5, Hpai::NAT);
    request.status = 0x27;
    mock.add_response(frame_bytes(&Frame::DisconnectRequest(request)));

    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Disconnecting);
    assert_eq!(client.next_event().await.unwrap(), TunnelEvent::Disconnected { status: 0x27 });
    assert!(matches!(sent_frames(&mock).last(), Some((Frame::DisconnectResponse(_), _))));
    assert_eq!(mock.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_local_disconnect_and_reconnect() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        sent_frames(&mock).as_slice(),
        [(Frame::DisconnectRequest(r), to)] if r.channel_id == 5 && *to == MOCK_GATEWAY
    ));
    assert!(!mock.is_ready());

    // the closed transport is bound again on the next connect
    mock.add_response(accept(9));
    assert_eq!(client.connect_and_wait().await.unwrap(), 9);
    assert!(mock.bound().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_transport_when_send_fails() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;
    mock.set_ready(false);

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(mock.sent_packets().is_empty());
    assert_eq!(mock.close_count(), 1);

    mock.add_response(accept(6));
    assert_eq!(client.connect_and_wait().await.unwrap(), 6);
    assert_eq!(mock.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_is_silent() {
    let mock = MockTransport::new();
    let mut client = connected_client(&mock, 5).await;
    client.write(me(), GroupAddress::from(1), &[0x01]).await.unwrap();
    mock.clear_sent();

    client.dispose();
    assert!(mock.sent_packets().is_empty());
    assert_eq!(mock.close_count(), 1);
    assert!(client.next_event().await.is_err());
    assert!(client.write(me(), GroupAddress::from(1), &[0x01]).await.is_err());
}

// =============================================================================
// Routing
// =============================================================================

fn routing_client(mock: &MockTransport) -> RoutingClient<MockTransport> {
    init_logging();
    RoutingClient::with_transport(mock.clone(), RoutingConfig::default())
}

#[tokio::test]
async fn test_routing_send() {
    let mock = MockTransport::new();
    let mut client = routing_client(&mock);
    client.send(IndividualAddress::from(0x1105), GroupAddress::from(0x0A03), &[0x01]).await.unwrap();

    let (bytes, to) = mock.last_sent().unwrap();
    assert_eq!(to, RoutingConfig::default().multicast_group);
    assert_eq!(
        bytes,
        vec![0x06, 0x10, 0x05, 0x30, 0x00, 0x11, 0x29, 0x00, 0xBC, 0xE0, 0x11, 0x05, 0x0A, 0x03, 0x01, 0x00, 0x81]
    );
}

#[tokio::test]
async fn test_routing_recv_skips_unrelated() {
    let mock = MockTransport::new();
    let mut client = routing_client(&mock);
    let router = Router::new();

    mock.add_response(vec![0xDE, 0xAD]);
    mock.add_response(frame_bytes(&Frame::RoutingBusy(RoutingBusy {
        device_state: 0,
        wait_time_ms: 20,
        control: 0,
    })));
    mock.add_response(router.build_indication(IndividualAddress::from(0x1101), GroupAddress::from(3), &[0x01]).unwrap().to_vec());

    let message = client.recv().await.unwrap();
    assert_eq!(message.destination().raw(), 3);
    assert_eq!(mock.pending_responses(), 0);
}

#[tokio::test]
async fn test_routing_listen() {
    let mock = MockTransport::new();
    let mut client = routing_client(&mock);
    let router = Router::new();
    for sub in 1..=3u16 {
        mock.add_response(router.build_indication(IndividualAddress::from(0x1101), GroupAddress::from(sub), &[0x01]).unwrap().to_vec());
    }

    let mut seen = Vec::new();
    client
        .listen(|message| {
            seen.push(message.destination().raw());
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(mock.pending_responses(), 1);
}

#[tokio::test]
async fn test_routing_listen_ends_on_close() {
    let mock = MockTransport::new();
    let mut client = routing_client(&mock);

    let mut closer = mock.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        closer.close();
    });

    let mut count = 0;
    client
        .listen(|_| {
            count += 1;
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(client.send(me(), GroupAddress::from(1), &[1]).await.is_err());
}
