mod output;

use anyhow::{Context, Result};
use armctl::azure::auth::{self, Credentials};
use armctl::azure::client::ArmClient;
use armctl::azure::http::format_arm_error;
use armctl::compute::{
    ArmNodeDriver, CreateNode, DataDisk, Image, Location, NetworkConfig, Node, OsDisk, PublicIpAllocation,
    ResourceHandle, Size, Subnet,
};
use armctl::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use output::OutputFormat;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Azure Resource Manager compute client
#[derive(Parser, Debug)]
#[command(name = "armctl", version = armctl::VERSION, about, long_about = None)]
struct Args {
    /// Azure subscription to use
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// Bearer token (defaults to AZURE_ACCESS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List locations available to the subscription
    Locations,
    /// List VM sizes of a location
    Sizes { location: String },
    /// List nodes, resolving their addresses
    Nodes {
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
    },
    /// Show one node
    Node { id: String },
    /// Show the power state of a node
    State { id: String },
    /// Restart a node
    Reboot { id: String },
    /// Delete a node
    Destroy { id: String },
    /// Walk the marketplace image catalog
    Images {
        /// Location to walk (all locations when omitted)
        #[arg(short, long)]
        location: Option<String>,
        /// Only walk this publisher
        #[arg(short, long)]
        publisher: Option<String>,
    },
    /// List virtual networks
    Networks,
    /// List the subnets of a virtual network
    Subnets { network_id: String },
    /// Create a node with a new network interface
    Create(CreateArgs),
}

#[derive(clap::Args, Debug)]
struct CreateArgs {
    name: String,
    #[arg(short, long)]
    location: String,
    #[arg(long)]
    size: String,
    #[arg(short = 'g', long)]
    resource_group: String,
    /// Image URN: publisher:offer:sku:os:version
    #[arg(long)]
    image: String,
    /// Virtual network resource id
    #[arg(long)]
    network: String,
    #[arg(long)]
    subnet: String,
    /// "new", "none" or the resource id of an existing public IP
    #[arg(long, default_value = "new")]
    public_ip: String,
    #[arg(long, default_value = "azureuser")]
    admin_username: String,
    /// SSH public key file installed for the admin user
    #[arg(long)]
    ssh_key: Option<PathBuf>,
    /// Storage account holding the VHDs
    #[arg(long)]
    storage_account: String,
    #[arg(long, default_value_t = 30)]
    os_disk_size: u32,
    /// Size in GB of an extra empty data disk (repeatable)
    #[arg(long = "data-disk")]
    data_disks: Vec<u32>,
    #[arg(long)]
    availability_set: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_path.display(), e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("armctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("armctl").join("armctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".armctl").join("armctl.log");
    }
    PathBuf::from("armctl.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("Command failed: {:#}", err);
        eprintln!("Error: {}", format_arm_error(&err));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    let subscription = args
        .subscription
        .clone()
        .or_else(|| config.effective_subscription())
        .context("No subscription configured. Set AZURE_SUBSCRIPTION_ID or use --subscription")?;

    let credentials = match args.token.clone() {
        Some(token) => Credentials::new(token),
        None => Credentials::from_env().with_context(|| {
            format!("No access token. Set {} or use --token", auth::TOKEN_ENV)
        })?,
    };

    tracing::info!("Using subscription: {}", subscription);

    let client = ArmClient::new(&subscription, &credentials, config.client.clone())?;
    let driver = ArmNodeDriver::new(client);

    if config.subscription_id.as_deref() != Some(subscription.as_str()) {
        if let Err(e) = config.set_subscription(&subscription) {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    let format = args.output;

    let rendered = match args.command {
        Command::Locations => {
            let locations = driver.list_locations().await?;
            output::render(&locations, output::LOCATION_COLUMNS, format)?
        },
        Command::Sizes { location } => {
            let sizes = driver.list_sizes(&location).await?;
            output::render(&sizes, output::SIZE_COLUMNS, format)?
        },
        Command::Nodes { resource_group } => {
            let resource_group = resource_group.or_else(|| config.resource_group.clone());
            let nodes = driver.list_nodes(resource_group.as_deref()).await?;
            output::render(&nodes, output::NODE_COLUMNS, format)?
        },
        Command::Node { id } => {
            let node = driver.get_node(&ResourceHandle::new(id)).await?;
            output::render(&[node], output::NODE_COLUMNS, format)?
        },
        Command::State { id } => {
            let state = driver.get_node_state(&node_ref(id)).await?;
            state.to_string()
        },
        Command::Reboot { id } => {
            let node = node_ref(id);
            let accepted = driver.reboot_node(&node).await?;
            outcome("Reboot", &node, accepted)
        },
        Command::Destroy { id } => {
            let node = node_ref(id);
            let accepted = driver.destroy_node(&node).await?;
            outcome("Destroy", &node, accepted)
        },
        Command::Images { location, publisher } => {
            let location = location.or_else(|| config.location.clone());
            let images = driver
                .list_images(location.as_deref(), publisher.as_deref())
                .await?;
            output::render(&images, output::IMAGE_COLUMNS, format)?
        },
        Command::Networks => {
            let networks = driver.list_virtual_networks().await?;
            output::render(&networks, output::NETWORK_COLUMNS, format)?
        },
        Command::Subnets { network_id } => {
            let subnets = driver
                .list_subnets(&ResourceHandle::new(network_id))
                .await?;
            output::render(&subnets, output::SUBNET_COLUMNS, format)?
        },
        Command::Create(create) => {
            let request = build_create_request(&driver, create).await?;
            let node = driver.create_node(&request).await?;
            output::render(&[node], output::NODE_COLUMNS, format)?
        },
    };

    println!("{}", rendered);
    Ok(())
}

/// A node known only by its id
fn node_ref(id: String) -> Node {
    let handle = ResourceHandle::new(id);
    let name = handle.name().to_string();
    Node::pending(handle, &name)
}

fn outcome(action: &str, node: &Node, accepted: bool) -> String {
    if accepted {
        format!("{} of {} accepted", action, node.name)
    } else {
        format!("{} of {} was not accepted", action, node.name)
    }
}

async fn build_create_request(driver: &ArmNodeDriver, args: CreateArgs) -> Result<CreateNode> {
    let image = Image::from_urn(&args.image, &args.location)?;

    let network_id = ResourceHandle::new(args.network);
    let network_name = network_id.name().to_string();
    let network = driver
        .resolve_virtual_network(&network_id, &network_name, &args.location)
        .await?;

    let subnet = network
        .subnets
        .iter()
        .find(|s| s.name == args.subnet)
        .cloned()
        .unwrap_or_else(|| Subnet::new(network_id.child(&format!("subnets/{}", args.subnet)), &args.subnet));

    let public_ip = match args.public_ip.as_str() {
        "new" => PublicIpAllocation::AllocateNew,
        "none" => PublicIpAllocation::None,
        id => PublicIpAllocation::Existing(ResourceHandle::from(id)),
    };

    let network_config = NetworkConfig::new(network, subnet, public_ip)?;

    let mut request = CreateNode::new(
        &args.name,
        Location::new(&args.location),
        Size::new(&args.size),
        &args.resource_group,
        image,
        &args.admin_username,
        OsDisk {
            account: args.storage_account.clone(),
            size_gb: args.os_disk_size,
        },
    )
    .network_config(network_config);

    for size_gb in args.data_disks {
        request = request.data_disk(DataDisk {
            account: args.storage_account.clone(),
            size_gb,
        });
    }

    if let Some(availability_set) = &args.availability_set {
        request = request.availability_set(availability_set);
    }

    if let Some(path) = &args.ssh_key {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SSH key {}", path.display()))?;
        request = request.public_key(key.trim());
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_create() {
        let args = Args::try_parse_from([
            "armctl",
            "create",
            "vm1",
            "--location",
            "westeurope",
            "--size",
            "Standard_A1",
            "-g",
            "rg1",
            "--image",
            "Canonical:UbuntuServer:16.04-LTS:Linux:latest",
            "--network",
            "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1",
            "--subnet",
            "default",
            "--storage-account",
            "storage1",
            "--data-disk",
            "10",
            "--data-disk",
            "20",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(args.output, OutputFormat::Json);
        match args.command {
            Command::Create(create) => {
                assert_eq!(create.public_ip, "new");
                assert_eq!(create.os_disk_size, 30);
                assert_eq!(create.data_disks, vec![10, 20]);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_node_ref_uses_last_segment() {
        let node = node_ref("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1".into());
        assert_eq!(node.name, "vm1");
    }
}
