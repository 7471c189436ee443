use std::net::SocketAddr;

use mathbattle::http;
use mathbattle::registry::RoomRegistry;
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() {
    let registry = RoomRegistry::new();

    let static_root = std::env::var("STATIC_ROOT").unwrap_or_else(|_| "public".to_string());
    let app = http::router(registry).fallback_service(
        ServeDir::new(&static_root).append_index_html_on_directories(true),
    );

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Battle server listening on {}", addr);
    println!("Serving static files from {}/", static_root);
    println!("\nAvailable endpoints:");
    println!("  POST /api/battle/rooms/join               - Join or create a room");
    println!("  POST /api/battle/rooms/quick              - Match into any waiting room");
    println!("  POST /api/battle/rooms/{{room_id}}/config   - Update room settings (host)");
    println!("  POST /api/battle/rooms/{{room_id}}/start    - Start the battle (host)");
    println!("  POST /api/battle/rooms/{{room_id}}/answer   - Submit an answer");
    println!("  POST /api/battle/rooms/{{room_id}}/leave    - Leave the room");
    println!("  GET  /api/battle/rooms/{{room_id}}/state    - Poll the room state");
    println!("  POST /api/check                           - Check a single answer");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
