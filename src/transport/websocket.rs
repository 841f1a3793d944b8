use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::rooms::ChatService;
use crate::transport::message::{ClientMessage, ServerMessage};

pub async fn start_websocket_server(addr: &str, service: ChatService) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("WebSocket server listening on ws://{}", addr);

    serve(listener, service).await;
    Ok(())
}

/// Accepts connections on `listener` until it fails.
pub async fn serve(listener: TcpListener, service: ChatService) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "Accepted connection");
                spawn(handle_connection(stream, service.clone()));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                break;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, service: ChatService) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for this client
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Arc::new(Client::new(tx));
    let session_id = client.id.clone();

    tracing::info!(session = %session_id, "Client connected");

    // Forward queued frames to the socket
    let writer_session = session_id.clone();
    let writer = spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::debug!(session = %writer_session, error = %e, "Failed to send frame");
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(session = %session_id, error = %e, "Read error");
                break;
            }
        };

        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(request) => {
                if let Some(reply) = handle_client_message(&service, &client, request).await {
                    client.send(&reply);
                }
            }
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "Invalid client message");
                client.send(&ServerMessage::Error {
                    code: "bad_request".to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::info!(session = %session_id, "Client disconnected");

    // Releases the membership and every hub registration of this session.
    if let Err(e) = service.exit(&session_id).await {
        tracing::warn!(
            session = %session_id,
            error = %e,
            "Failed to release session on disconnect"
        );
    }

    drop(client);
    writer.abort();
}

/// Runs one client request against the service. Returns the frame to send
/// back, if the request has one; sent messages come back through the room
/// subscription instead.
pub async fn handle_client_message(
    service: &ChatService,
    client: &Arc<Client>,
    request: ClientMessage,
) -> Option<ServerMessage> {
    let reply = match request {
        ClientMessage::Join { content_id } => service
            .enter(&client.id, content_id, client.clone())
            .await
            .map(|presence| ServerMessage::Joined {
                room_id: presence.room_id,
                occupancy: presence.occupancy,
            }),

        ClientMessage::Leave => service.exit(&client.id).await.map(|left| match left {
            Some(presence) => ServerMessage::Left {
                room_id: presence.room_id,
                occupancy: presence.occupancy,
            },
            None => ServerMessage::NotInRoom {},
        }),

        ClientMessage::Send { payload } => {
            return match service.send_message(&client.id, &payload).await {
                Ok(_) => None,
                Err(e) => Some(ServerMessage::from(&e)),
            };
        }

        ClientMessage::ListRooms { page, size } => service
            .list_rooms(
                page.unwrap_or(0),
                size.unwrap_or_else(|| service.default_page_size()),
            )
            .await
            .map(ServerMessage::Rooms),

        ClientMessage::ChatActive { content_id } => service
            .is_chat_active(content_id)
            .await
            .map(|active| ServerMessage::ChatActive { content_id, active }),
    };

    Some(reply.unwrap_or_else(|e| {
        tracing::debug!(session = %client.id, code = e.code(), "Request failed");
        ServerMessage::from(&e)
    }))
}
