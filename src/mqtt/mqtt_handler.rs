use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::BrokerEndpoint;
use super::frame::InboundFrame;
use super::listener::{BrokerEvents, ListenerError};

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 10;

/// A single broker session: the rumqttc client plus its event loop.
///
/// The session is never re-established. When the broker refuses the
/// connection or the transport fails, [`run`](Self::run) returns and the
/// listener is done.
pub struct MqttHandler {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttHandler {
    pub fn new(endpoint: &BrokerEndpoint) -> Self {
        let mut mqtt_options =
            MqttOptions::new(endpoint.client_id.clone(), endpoint.host.clone(), endpoint.port);
        mqtt_options
            .set_keep_alive(endpoint.keep_alive())
            .set_max_packet_size(endpoint.max_packet_size, endpoint.max_packet_size)
            .set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        MqttHandler { client, eventloop }
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Polls the broker until cancelled or until the connection ends,
    /// dispatching CONNACK and PUBLISH packets to `events`.
    pub async fn run(
        mut self,
        events: &mut impl BrokerEvents,
        token: CancellationToken,
    ) -> Result<(), ListenerError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Cancellation received, disconnecting");
                    if let Err(e) = self.client.try_disconnect() {
                        debug!("Disconnect request not delivered: {}", e);
                    }
                    return Ok(());
                }
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                        events.on_connect(connack.code as u8);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let frame = InboundFrame::from_topic(publish.topic, publish.payload.to_vec());
                        events.on_message(frame);
                    }
                    Ok(Event::Incoming(Packet::SubAck(suback))) => {
                        debug!("Subscription acknowledged: {:?}", suback.return_codes);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        info!("Broker closed the session");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(ConnectionError::ConnectionRefused(code)) => {
                        let code = code as u8;
                        events.on_connect(code);
                        return Err(ListenerError::Refused(code));
                    }
                    Err(e) => {
                        warn!("MQTT event loop error, not reconnecting: {}", e);
                        return Err(ListenerError::Connection(e));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::frame::tests::compress;
    use crate::mqtt::listener::{ConnectionState, Listener};
    use crate::test_support::capture_logs;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CONNECT: u8 = 0x10;
    const SUBSCRIBE: u8 = 0x82;

    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            len |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    fn connack(code: u8) -> Vec<u8> {
        vec![0x20, 0x02, 0x00, code]
    }

    fn publish(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0x30];
        let mut len = 2 + topic.len() + payload.len();
        loop {
            let mut byte = (len % 128) as u8;
            len /= 128;
            if len > 0 {
                byte |= 0x80;
            }
            packet.push(byte);
            if len == 0 {
                break;
            }
        }
        packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        packet.extend_from_slice(topic.as_bytes());
        packet.extend_from_slice(payload);
        packet
    }

    /// Waits for the client to hang up so the socket closes without a reset
    async fn drain(mut stream: TcpStream) {
        let mut buf = [0u8; 256];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    }

    /// Accepts one client, acknowledges it, waits for its SUBSCRIBE, sends
    /// `frames` on the subscribed topic and closes. Returns the topic.
    async fn serve_frames(socket: TcpListener, frames: Vec<Vec<u8>>) -> String {
        let (mut stream, _) = socket.accept().await.unwrap();
        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header, CONNECT);
        stream.write_all(&connack(0)).await.unwrap();

        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header, SUBSCRIBE);
        let topic_len = u16::from_be_bytes([body[2], body[3]]) as usize;
        let topic = String::from_utf8(body[4..4 + topic_len].to_vec()).unwrap();

        for frame in frames {
            stream.write_all(&publish(&topic, &frame)).await.unwrap();
        }
        stream.shutdown().await.unwrap();
        drain(stream).await;
        topic
    }

    async fn local_broker() -> (TcpListener, BrokerEndpoint) {
        let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = BrokerEndpoint {
            host: "127.0.0.1".to_string(),
            port: socket.local_addr().unwrap().port(),
            ..BrokerEndpoint::default()
        };
        (socket, endpoint)
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut seed: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 24) as u8
            })
            .collect()
    }

    #[tokio::test]
    async fn test_broker_frames_reach_the_listener() {
        let (socket, endpoint) = local_broker().await;
        let broker = tokio::spawn(serve_frames(
            socket,
            vec![b"garbage".to_vec(), compress(&[0x01, 0x02, 0xff])],
        ));

        let handler = MqttHandler::new(&endpoint);
        let mut listener = Listener::new(endpoint, Arc::new(handler.client()));
        let (logs, _guard) = capture_logs();

        let result = handler.run(&mut listener, CancellationToken::new()).await;

        assert_eq!(broker.await.unwrap(), "esp32/hdlc");
        // the broker hanging up ends the session for good
        assert!(matches!(result, Err(ListenerError::Connection(_))));

        let stats = listener.stats();
        assert_eq!(stats.connection_state, ConnectionState::Connected);
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_decoded, 1);
        assert!(logs.contents().contains("0102ff"));
    }

    #[tokio::test]
    async fn test_frames_above_ten_kib_do_not_end_the_session() {
        let large = compress(&noise(20_000));
        assert!(large.len() > 10 * 1024);

        let (socket, endpoint) = local_broker().await;
        let broker = tokio::spawn(serve_frames(
            socket,
            vec![large, compress(&[0x01, 0x02, 0xff])],
        ));

        let handler = MqttHandler::new(&endpoint);
        let mut listener = Listener::new(endpoint, Arc::new(handler.client()));
        let (logs, _guard) = capture_logs();

        let _ = handler.run(&mut listener, CancellationToken::new()).await;
        broker.await.unwrap();

        assert_eq!(listener.stats().frames_decoded, 2);
        assert_eq!(listener.stats().frames_rejected, 0);
        assert!(logs.contents().contains("0102ff"));
    }

    #[tokio::test]
    async fn test_refused_connack_reports_code_and_stops() {
        let (socket, endpoint) = local_broker().await;
        let broker = tokio::spawn(async move {
            let (mut stream, _) = socket.accept().await.unwrap();
            let (header, _) = read_packet(&mut stream).await;
            assert_eq!(header, CONNECT);
            stream.write_all(&connack(5)).await.unwrap();
            drain(stream).await;
        });

        let handler = MqttHandler::new(&endpoint);
        let mut listener = Listener::new(endpoint, Arc::new(handler.client()));
        let (logs, _guard) = capture_logs();

        let result = handler.run(&mut listener, CancellationToken::new()).await;
        broker.await.unwrap();

        assert!(matches!(result, Err(ListenerError::Refused(5))));
        assert_eq!(listener.stats().connection_state, ConnectionState::Failed);
        assert_eq!(listener.stats().subscriptions, 0);
        assert!(logs.contents().contains("return code 5"));
    }

    #[tokio::test]
    async fn test_unreachable_broker_ends_the_loop() {
        let (socket, endpoint) = local_broker().await;
        drop(socket);

        let handler = MqttHandler::new(&endpoint);
        let mut listener = Listener::new(endpoint, Arc::new(handler.client()));

        let result = handler.run(&mut listener, CancellationToken::new()).await;

        assert!(matches!(result, Err(ListenerError::Connection(_))));
        assert_eq!(listener.stats().connection_state, ConnectionState::Connecting);
    }
}
