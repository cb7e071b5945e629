/*
 *  Relays, a realtime multiplayer server for Super Tic-Tac-Toe.
 *  Copyright (C) 2025 ToTheAnd
 *
 *  Relays is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  Relays is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with Relays. If not, see <https://www.gnu.org/licenses/>.
 */

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relays::store::MemoryStore;
use relays::{AppState, ServerConfig, http};

#[derive(Parser, Debug)]
#[command(name = "relays", about = "Realtime multiplayer server for Super Tic-Tac-Toe")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    /// Seconds between heartbeat pings.
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,
    /// Seconds of pong silence before a connection counts as dead.
    #[arg(long, default_value_t = 90)]
    pong_timeout_secs: u64,
    /// Connection cap per match.
    #[arg(long, default_value_t = 100)]
    max_connections: usize,
    /// Seconds the computer opponent may think.
    #[arg(long, default_value_t = 3)]
    search_deadline_secs: u64,
    /// Minimax depth below the root on hard difficulty.
    #[arg(long, default_value_t = cranks::Engine::DEFAULT_DEPTH)]
    search_depth: u32,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
            max_connections_per_match: self.max_connections,
            search_deadline: Duration::from_secs(self.search_deadline_secs),
            search_depth: self.search_depth,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let listen = args.listen;

    let store = Arc::new(MemoryStore::new());
    let app = AppState::new(args.into_config(), store);
    app.spawn_background_tasks();

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, "relays listening");
    axum::serve(listener, http::router(app)).await?;
    Ok(())
}
