//! CLI for operating a gavel live auction.
//!
//! This binary provides commands for:
//! - Driving the auction (start lot, bid, sold/unsold/skip, reset)
//! - Querying the current lot, leaderboard, and bid log
//! - Managing global configuration and seeding records
//! - Watching the live event stream

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde_json::json;

use gavel_client::{watch, WatchEndpoints};
use gavel_engine::queries::{BidLogEntry, CurrentLotView, LeaderboardEntry};
use gavel_types::{
    AuctionEvent, Bid, ClassYear, GlobalState, IncrementRule, LotOutcome, Player, PlayerStatus,
    Team,
};

#[derive(Parser)]
#[command(name = "gavel")]
#[command(about = "CLI for the gavel live auction server")]
struct Cli {
    /// Auction server authority (host:port)
    #[arg(long, default_value = "127.0.0.1:9955")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a lot for bidding
    StartLot {
        /// Player ID
        #[arg(long)]
        player_id: u64,

        /// Base price override (stored price applies when omitted)
        #[arg(long)]
        base_price: Option<u64>,
    },

    /// Place a bid on the active lot
    Bid {
        /// Player ID of the active lot
        #[arg(long)]
        player_id: u64,

        /// Bidding team ID
        #[arg(long)]
        team_id: u64,

        /// Bid amount
        #[arg(long)]
        amount: u64,
    },

    /// Resolve the lot as sold
    Sold {
        /// Player ID
        #[arg(long)]
        player_id: u64,

        /// Winning team ID
        #[arg(long)]
        team_id: u64,

        /// Final hammer price
        #[arg(long)]
        price: u64,
    },

    /// Release the lot unsold
    Unsold {
        /// Player ID
        #[arg(long)]
        player_id: u64,
    },

    /// Send the lot back to the queue at its sport's floor
    Skip {
        /// Player ID
        #[arg(long)]
        player_id: u64,
    },

    /// Clear the accumulated bids for the current lot
    ResetBid,

    /// Show the current lot
    Current,

    /// Show teams with rosters and spend totals
    Leaderboard {
        /// Include sandbox records even under lockdown
        #[arg(long)]
        include_test_data: bool,
    },

    /// Show the permanent bid log, newest first
    BidLog {
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the global state
    State,

    /// Toggle the auction-active flag
    SetActive {
        /// true or false
        #[arg(long, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Toggle the registration-open flag
    SetRegistration {
        /// true or false
        #[arg(long, action = clap::ArgAction::Set)]
        open: bool,
    },

    /// Toggle the sandbox-data lockdown flag
    SetLockdown {
        /// true or false
        #[arg(long, action = clap::ArgAction::Set)]
        locked: bool,
    },

    /// Replace the per-sport minimum bids
    SetMinBids {
        /// Comma-separated sport=amount pairs, e.g. cricket=100,futsal=60
        #[arg(long)]
        bids: String,
    },

    /// Replace the increment schedule
    SetRules {
        /// Comma-separated threshold:increment pairs, e.g. 0:10,200:50,500:100
        #[arg(long)]
        rules: String,
    },

    /// Update presentation timing
    SetAnimation {
        /// Duration in seconds
        #[arg(long)]
        duration: Option<u32>,

        /// Animation type name
        #[arg(long)]
        animation_type: Option<String>,
    },

    /// Create a team record
    SeedTeam {
        /// Team name
        #[arg(long)]
        name: String,

        /// Sport: cricket, futsal, or volleyball
        #[arg(long)]
        sport: String,

        /// Starting budget (default applies when omitted)
        #[arg(long)]
        budget: Option<u64>,

        /// Logo URL
        #[arg(long)]
        logo_url: Option<String>,

        /// Mark as sandbox data
        #[arg(long)]
        test_data: bool,
    },

    /// Create a player record
    SeedPlayer {
        /// Owning user ID
        #[arg(long)]
        user_id: u64,

        /// Player name
        #[arg(long)]
        name: String,

        /// Sport: cricket, futsal, or volleyball
        #[arg(long)]
        sport: String,

        /// Year: 1st, 2nd, or 3rd
        #[arg(long)]
        year: String,

        /// Base price (sport floor applies when omitted)
        #[arg(long)]
        base_price: Option<u64>,

        /// Initial status (pending when omitted)
        #[arg(long)]
        status: Option<String>,

        /// Mark as sandbox data
        #[arg(long)]
        test_data: bool,
    },

    /// Restore one team's wallet and release its roster
    ResetWallet {
        /// Team ID
        #[arg(long)]
        team_id: u64,
    },

    /// Restore every team's wallet
    ResetAllWallets,

    /// Reconcile denormalized budgets against sold rosters
    FixBudgets,

    /// Stream live auction events
    Watch,
}

fn parse_year(s: &str) -> Result<ClassYear> {
    match s {
        "1st" => Ok(ClassYear::First),
        "2nd" => Ok(ClassYear::Second),
        "3rd" => Ok(ClassYear::Third),
        other => Err(anyhow!("invalid year: {other:?} (expected 1st, 2nd, or 3rd)")),
    }
}

fn parse_status(s: &str) -> Result<PlayerStatus> {
    match s {
        "pending" => Ok(PlayerStatus::Pending),
        "approved" => Ok(PlayerStatus::Approved),
        "eligible" => Ok(PlayerStatus::Eligible),
        other => Err(anyhow!(
            "invalid initial status: {other:?} (expected pending, approved, or eligible)"
        )),
    }
}

fn parse_min_bids(s: &str) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    for pair in s.split(',') {
        let (sport, amount) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid pair: {pair:?} (expected sport=amount)"))?;
        map.insert(sport.trim().to_string(), json!(amount.trim().parse::<u64>()?));
    }
    Ok(serde_json::Value::Object(map))
}

fn parse_rules(s: &str) -> Result<Vec<IncrementRule>> {
    s.split(',')
        .map(|pair| {
            let (threshold, increment) = pair
                .split_once(':')
                .ok_or_else(|| anyhow!("invalid rule: {pair:?} (expected threshold:increment)"))?;
            Ok(IncrementRule {
                threshold: threshold.trim().parse()?,
                increment: increment.trim().parse()?,
            })
        })
        .collect()
}

fn print_current_lot(view: &CurrentLotView) {
    if !view.is_active {
        println!("(auction inactive)");
    }
    match &view.current_lot {
        Some(lot) => {
            println!("Lot: [{}] {} ({})", lot.player.id, lot.player.name, lot.player.sport);
            println!("  Base price: {}", lot.player.base_price);
            println!("  Current price: {}", lot.current_price);
            println!("  Next minimum bid: {}", lot.next_min_bid);
            match &lot.leading_bid {
                Some(lead) => println!(
                    "  Leading: {} by {} (team {})",
                    lead.bid.amount, lead.team_name, lead.bid.team_id
                ),
                None => println!("  Leading: no bids yet"),
            }
        }
        None => println!("No lot under the hammer"),
    }
}

fn print_event(event: &AuctionEvent) {
    match event {
        AuctionEvent::LotStarted { player, .. } => println!(
            "lot-started   player={} ({}) base={}",
            player.id, player.name, player.base_price
        ),
        AuctionEvent::BidAccepted {
            player_name,
            team_name,
            amount,
            ..
        } => println!("bid-accepted  {team_name} bids {amount} on {player_name}"),
        AuctionEvent::LotResolved { outcome, .. } => match outcome {
            LotOutcome::Sold {
                player_name,
                team_name,
                amount,
                ..
            } => println!("lot-sold      {player_name} to {team_name} for {amount}"),
            LotOutcome::Unsold { player_id } => println!("lot-unsold    player={player_id}"),
            LotOutcome::Skipped {
                player_name,
                floor_price,
                ..
            } => println!("lot-skipped   {player_name} back at {floor_price}"),
        },
        AuctionEvent::BidReset {
            player_name,
            floor_price,
            ..
        } => println!("bid-reset     {player_name} back to {floor_price}"),
        AuctionEvent::ConfigChanged { .. } => println!("config-changed"),
    }
}

async fn watch_cmd(server: &str) -> Result<()> {
    let endpoints = WatchEndpoints::from_authority(server);
    println!("Watching auction room at {server} (Ctrl+C to stop)");
    watch(
        &endpoints,
        |snapshot| {
            println!("--- synced ---");
            print_current_lot(snapshot);
            Ok(())
        },
        |event| {
            print_event(event);
            Ok(())
        },
    )
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gavel_client=info".parse().unwrap())
                .add_directive("jsonrpsee=warn".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Watch = cli.command {
        return watch_cmd(&cli.server).await;
    }

    let client: HttpClient = HttpClientBuilder::default().build(format!("http://{}", cli.server))?;

    match cli.command {
        Commands::StartLot {
            player_id,
            base_price,
        } => {
            let player: Player = client
                .request(
                    "auction_startLot",
                    rpc_params![json!({ "player_id": player_id, "base_price": base_price })],
                )
                .await?;
            println!(
                "Lot open: [{}] {} at base {}",
                player.id, player.name, player.base_price
            );
        }

        Commands::Bid {
            player_id,
            team_id,
            amount,
        } => {
            let bid: Bid = client
                .request(
                    "auction_placeBid",
                    rpc_params![json!({
                        "player_id": player_id,
                        "team_id": team_id,
                        "amount": amount
                    })],
                )
                .await?;
            println!("Bid accepted: {} on player {} (bid {})", bid.amount, bid.player_id, bid.id);
        }

        Commands::Sold {
            player_id,
            team_id,
            price,
        } => {
            let outcome: LotOutcome = client
                .request(
                    "auction_resolveSold",
                    rpc_params![json!({
                        "player_id": player_id,
                        "team_id": team_id,
                        "final_price": price
                    })],
                )
                .await?;
            if let LotOutcome::Sold {
                player_name,
                team_name,
                amount,
                ..
            } = outcome
            {
                println!("Sold: {player_name} to {team_name} for {amount}");
            }
        }

        Commands::Unsold { player_id } => {
            let _: LotOutcome = client
                .request(
                    "auction_resolveUnsold",
                    rpc_params![json!({ "player_id": player_id })],
                )
                .await?;
            println!("Unsold: player {player_id} returned to the pool");
        }

        Commands::Skip { player_id } => {
            let outcome: LotOutcome = client
                .request(
                    "auction_skipPlayer",
                    rpc_params![json!({ "player_id": player_id })],
                )
                .await?;
            if let LotOutcome::Skipped { floor_price, .. } = outcome {
                println!("Skipped: player {player_id} back in the queue at {floor_price}");
            }
        }

        Commands::ResetBid => {
            let ack: serde_json::Value = client.request("auction_resetBid", rpc_params![]).await?;
            println!(
                "Bids cleared for player {} (price back to {})",
                ack["player_id"], ack["floor_price"]
            );
        }

        Commands::Current => {
            let view: CurrentLotView = client.request("query_currentLot", rpc_params![]).await?;
            print_current_lot(&view);
        }

        Commands::Leaderboard { include_test_data } => {
            let entries: Vec<LeaderboardEntry> = client
                .request("query_leaderboard", rpc_params![include_test_data])
                .await?;
            if entries.is_empty() {
                println!("No teams registered");
            }
            for entry in entries {
                println!(
                    "[{}] {} ({}) spent {} / remaining {}",
                    entry.team_id,
                    entry.name,
                    entry.sport,
                    entry.total_spent,
                    entry.remaining_budget
                );
                for member in &entry.players {
                    println!("    {} for {}", member.name, member.sold_price);
                }
            }
        }

        Commands::BidLog { limit } => {
            let entries: Vec<BidLogEntry> =
                client.request("query_bidLog", rpc_params![limit]).await?;
            if entries.is_empty() {
                println!("No bids recorded");
            }
            for entry in entries {
                println!(
                    "{}  {} bid {} on {}",
                    entry.timestamp, entry.team_name, entry.amount, entry.player_name
                );
            }
        }

        Commands::State => {
            let state: GlobalState = client.request("state_get", rpc_params![]).await?;
            println!("Active: {}", state.is_active);
            println!("Registration open: {}", state.is_registration_open);
            println!("Lockdown: {}", state.testgrounds_locked);
            println!("Sport floors:");
            for (sport, floor) in &state.sport_min_bids {
                println!("  {sport}: {floor}");
            }
            println!("Increment schedule:");
            for rule in &state.increment_rules {
                println!("  from {}: +{}", rule.threshold, rule.increment);
            }
            println!(
                "Animation: {} ({}s)",
                state.animation_type, state.animation_duration
            );
        }

        Commands::SetActive { on } => {
            let _: GlobalState = client.request("state_setActive", rpc_params![on]).await?;
            println!("Auction active: {on}");
        }

        Commands::SetRegistration { open } => {
            let _: GlobalState = client
                .request("state_setRegistrationOpen", rpc_params![open])
                .await?;
            println!("Registration open: {open}");
        }

        Commands::SetLockdown { locked } => {
            let _: GlobalState = client
                .request("state_setLockdown", rpc_params![locked])
                .await?;
            println!("Lockdown: {locked}");
        }

        Commands::SetMinBids { bids } => {
            let parsed = parse_min_bids(&bids)?;
            let _: GlobalState = client
                .request(
                    "state_updateSportMinBids",
                    rpc_params![json!({ "sport_min_bids": parsed })],
                )
                .await?;
            println!("Sport minimum bids updated");
        }

        Commands::SetRules { rules } => {
            let parsed = parse_rules(&rules)?;
            let stored: Vec<IncrementRule> = client
                .request(
                    "state_updateIncrementRules",
                    rpc_params![json!({ "rules": parsed })],
                )
                .await?;
            println!("Increment schedule updated:");
            for rule in stored {
                println!("  from {}: +{}", rule.threshold, rule.increment);
            }
        }

        Commands::SetAnimation {
            duration,
            animation_type,
        } => {
            let _: GlobalState = client
                .request(
                    "state_updateAnimation",
                    rpc_params![json!({
                        "duration": duration,
                        "animation_type": animation_type
                    })],
                )
                .await?;
            println!("Animation settings updated");
        }

        Commands::SeedTeam {
            name,
            sport,
            budget,
            logo_url,
            test_data,
        } => {
            let team: Team = client
                .request(
                    "admin_seedTeam",
                    rpc_params![json!({
                        "name": name,
                        "sport": sport,
                        "budget": budget,
                        "logo_url": logo_url,
                        "is_test_data": test_data
                    })],
                )
                .await?;
            println!("Team created: [{}] {} with budget {}", team.id, team.name, team.budget);
        }

        Commands::SeedPlayer {
            user_id,
            name,
            sport,
            year,
            base_price,
            status,
            test_data,
        } => {
            let year = parse_year(&year)?;
            let status = status.as_deref().map(parse_status).transpose()?;
            let player: Player = client
                .request(
                    "admin_seedPlayer",
                    rpc_params![json!({
                        "user_id": user_id,
                        "name": name,
                        "sport": sport,
                        "year": year,
                        "base_price": base_price,
                        "status": status,
                        "is_test_data": test_data
                    })],
                )
                .await?;
            println!(
                "Player created: [{}] {} ({}, base {})",
                player.id, player.name, player.status, player.base_price
            );
        }

        Commands::ResetWallet { team_id } => {
            let team: Team = client
                .request("admin_resetTeamWallet", rpc_params![team_id])
                .await?;
            println!(
                "Wallet reset: [{}] {} back to {}",
                team.id, team.name, team.remaining_budget
            );
        }

        Commands::ResetAllWallets => {
            let count: usize = client.request("admin_resetAllWallets", rpc_params![]).await?;
            println!("Wallets reset for {count} teams");
        }

        Commands::FixBudgets => {
            let ack: serde_json::Value = client
                .request("admin_recomputeBudgets", rpc_params![])
                .await?;
            let adjusted = ack["adjusted_teams"].as_array().map(Vec::len).unwrap_or(0);
            println!("Budgets reconciled; {adjusted} teams adjusted");
        }

        Commands::Watch => unreachable!("handled before connecting"),
    }

    Ok(())
}
