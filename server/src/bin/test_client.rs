use shared::{encode, tags};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

/// Smoke-test client: joins the relay, announces an avatar, walks it a few
/// steps, and leaves, printing every datagram exchanged. Run it in two or
/// more terminals against one relay to watch the broadcasts cross over.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create local socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    // Server address
    let server_addr = "127.0.0.1:8080".parse::<SocketAddr>()?;

    let client_id = Uuid::new_v4();
    println!("Joining as {}", client_id);

    // Join and wait for the acknowledgment
    let join = encode(tags::JOIN, [client_id.to_string()]);
    socket.send_to(join.as_bytes(), server_addr).await?;

    let mut buf = [0u8; 2048];
    let (len, addr) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    println!(
        "Received from {}: {}",
        addr,
        String::from_utf8_lossy(&buf[..len])
    );

    // Announce the avatar (texture left to the server default)
    let create = encode(
        tags::CREATE,
        [client_id.to_string(), "0".into(), "1".into(), "0".into()],
    );
    println!("Sending: {}", create);
    socket.send_to(create.as_bytes(), server_addr).await?;

    // Walk a few steps, then keep listening for relayed traffic from peers
    for step in 0..10 {
        let x = (step as f32 * 0.5).to_string();
        let relocate = encode(
            tags::MOVE,
            [client_id.to_string(), x, "1".into(), "0".into()],
        );
        println!("Sending: {}", relocate);
        socket.send_to(relocate.as_bytes(), server_addr).await?;

        // Print anything relayed to us while we wait out the step
        while let Ok(Ok((len, addr))) =
            timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await
        {
            println!(
                "Received from {}: {}",
                addr,
                String::from_utf8_lossy(&buf[..len])
            );
        }

        sleep(Duration::from_millis(300)).await;
    }

    // Leave the session
    let bye = encode(tags::BYE, [client_id.to_string()]);
    println!("Sending: {}", bye);
    socket.send_to(bye.as_bytes(), server_addr).await?;

    println!("Done");
    Ok(())
}
