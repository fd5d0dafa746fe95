use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use scene::{
    AttributeValue, ChangeOrigin, ComponentKey, ComponentRegistry, ComponentSpec, EntityId,
    Scene,
};
use serde::Serialize;
use syncmgr::{
    PeerId, RecordingTransport, SyncConfig, SyncManager, SyncRole, SERVER_PEER,
};
use wire::{decode_message, MessageId, WireLimits};

const TRANSFORM_HASH: u32 = 0x7A3F_0001;
const LABEL_HASH: u32 = 0x7A3F_0002;

#[derive(Parser)]
#[command(
    name = "scene-sim",
    version,
    about = "Deterministic server/client replication simulation over loopback"
)]
struct Cli {
    /// Number of simulated clients.
    #[arg(long, default_value_t = 2)]
    clients: u32,
    /// Number of server-owned entities.
    #[arg(long, default_value_t = 16)]
    entities: u32,
    /// Number of frames to simulate.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// Seconds of simulated time per frame.
    #[arg(long, default_value_t = 0.04)]
    frame_dt: f64,
    /// RNG seed for deterministic results.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Probability (percent) that an entity moves on a given frame.
    #[arg(long, default_value_t = 40)]
    move_chance: u32,
    /// Output directory for summary.json.
    #[arg(long, default_value = "target/scene-sim")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir {}", cli.out_dir.display()))?;

    let mut rng = Rng::new(cli.seed);
    let mut sim = Simulation::new(&cli)?;
    for _ in 0..cli.ticks {
        sim.step(&cli, &mut rng);
    }
    // Quiescent frames so every last change drains.
    for _ in 0..4 {
        sim.settle(&cli);
    }

    sim.verify_convergence()?;
    let summary = sim.summary(&cli);
    write_summary_json(&cli.out_dir, &summary)?;
    println!(
        "{} ticks, {} clients, {} entities: {} messages, {} bytes on the wire",
        cli.ticks, cli.clients, cli.entities, summary.total_messages, summary.total_bytes
    );
    Ok(())
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            ComponentSpec::new(TRANSFORM_HASH, "Transform")
                .attribute(AttributeValue::F32(0.0))
                .attribute(AttributeValue::F32(0.0))
                .attribute(AttributeValue::F32(0.0)),
        )
        .expect("fresh registry");
    registry
        .register(
            ComponentSpec::new(LABEL_HASH, "Label")
                .attribute(AttributeValue::String(String::new())),
        )
        .expect("fresh registry");
    registry
}

struct Simulation {
    server: SyncManager,
    clients: Vec<SyncManager>,
    entity_ids: Vec<EntityId>,
    transform_key: ComponentKey,
    counts: MessageCounts,
    total_bytes: u64,
}

impl Simulation {
    fn new(cli: &Cli) -> Result<Self> {
        let mut server = SyncManager::new(
            SyncRole::Server,
            Scene::new(registry()),
            SyncConfig::new(cli.frame_dt),
        );
        let mut clients = Vec::new();
        for index in 0..cli.clients {
            let peer = PeerId(index + 1);
            server.on_peer_connected(peer);
            server.on_peer_authenticated(peer);
            clients.push(SyncManager::new(
                SyncRole::Client,
                Scene::new(registry()),
                SyncConfig::new(cli.frame_dt),
            ));
        }

        let transform_key = ComponentKey::new(TRANSFORM_HASH, "root");
        let mut entity_ids = Vec::new();
        for index in 0..cli.entities {
            let scene = server.scene_mut();
            let id = scene
                .create_entity(None, ChangeOrigin::Local)
                .context("populate server scene")?;
            scene
                .get_or_create_component(id, TRANSFORM_HASH, "root", ChangeOrigin::Local)
                .context("attach transform")?;
            let label = scene
                .get_or_create_component(id, LABEL_HASH, "name", ChangeOrigin::Local)
                .context("attach label")?;
            scene
                .set_attribute(
                    id,
                    &label,
                    0,
                    AttributeValue::String(format!("entity-{index}")),
                    ChangeOrigin::Local,
                )
                .context("set label")?;
            entity_ids.push(id);
        }

        Ok(Self {
            server,
            clients,
            entity_ids,
            transform_key,
            counts: MessageCounts::default(),
            total_bytes: 0,
        })
    }

    /// One simulated frame: mutate, tick everyone, deliver everything.
    fn step(&mut self, cli: &Cli, rng: &mut Rng) {
        for &id in &self.entity_ids {
            if rng.chance(cli.move_chance) {
                let x = (rng.next_u64() % 2000) as f32 / 10.0;
                let scene = self.server.scene_mut();
                scene
                    .set_attribute(
                        id,
                        &self.transform_key,
                        0,
                        AttributeValue::F32(x),
                        ChangeOrigin::Local,
                    )
                    .expect("transform exists");
            }
        }
        self.exchange(cli.frame_dt);
    }

    /// A frame with no mutations.
    fn settle(&mut self, cli: &Cli) {
        self.exchange(cli.frame_dt);
    }

    fn exchange(&mut self, frame_dt: f64) {
        let mut server_out = RecordingTransport::new();
        self.server.tick(frame_dt, &mut server_out);

        let mut sink = RecordingTransport::new();
        for (peer, bytes) in server_out.take() {
            self.account(&bytes);
            let client = &mut self.clients[peer.raw() as usize - 1];
            client.handle_message(SERVER_PEER, &bytes, &mut sink);
        }

        let mut inbound: Vec<(PeerId, Vec<u8>)> = Vec::new();
        for (index, client) in self.clients.iter_mut().enumerate() {
            let mut client_out = RecordingTransport::new();
            client.tick(frame_dt, &mut client_out);
            for (_, bytes) in client_out.take() {
                inbound.push((PeerId(index as u32 + 1), bytes));
            }
        }
        for (source, bytes) in inbound {
            self.account(&bytes);
            self.server.handle_message(source, &bytes, &mut sink);
        }

        // Replies such as collision notices go straight back out.
        for (peer, bytes) in sink.take() {
            self.account(&bytes);
            let client = &mut self.clients[peer.raw() as usize - 1];
            let mut ignored = RecordingTransport::new();
            client.handle_message(SERVER_PEER, &bytes, &mut ignored);
        }
    }

    fn account(&mut self, bytes: &[u8]) {
        self.total_bytes += bytes.len() as u64;
        if let Ok(message) = decode_message(bytes, &WireLimits::default()) {
            self.counts.record(message.id());
        }
    }

    fn verify_convergence(&self) -> Result<()> {
        let server_scene = self.server.scene();
        for (index, client) in self.clients.iter().enumerate() {
            let client_scene = client.scene();
            for entity in server_scene.entities() {
                if !entity.id().is_replicable() {
                    continue;
                }
                let Some(mirror) = client_scene.entity(entity.id()) else {
                    bail!(
                        "client {} is missing entity {}",
                        index,
                        entity.id().raw()
                    );
                };
                for component in entity.components() {
                    if !component.is_replicated() {
                        continue;
                    }
                    let Some(counterpart) = mirror.component(component.key()) else {
                        bail!(
                            "client {} entity {} is missing component {:?}",
                            index,
                            entity.id().raw(),
                            component.key()
                        );
                    };
                    let server_bytes = component.full_bytes(64 * 1024)?;
                    let client_bytes = counterpart.full_bytes(64 * 1024)?;
                    if server_bytes != client_bytes {
                        bail!(
                            "client {} diverged on entity {} component {:?}",
                            index,
                            entity.id().raw(),
                            component.key()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn summary(&self, cli: &Cli) -> Summary {
        Summary {
            clients: cli.clients,
            entities: cli.entities,
            ticks: cli.ticks,
            seed: cli.seed,
            total_messages: self.counts.total(),
            total_bytes: self.total_bytes,
            create_entity: self.counts.create_entity,
            remove_entity: self.counts.remove_entity,
            create_components: self.counts.create_components,
            update_components: self.counts.update_components,
            remove_components: self.counts.remove_components,
            id_collisions: self.counts.id_collisions,
        }
    }
}

#[derive(Debug, Default)]
struct MessageCounts {
    create_entity: u64,
    remove_entity: u64,
    create_components: u64,
    update_components: u64,
    remove_components: u64,
    id_collisions: u64,
}

impl MessageCounts {
    fn record(&mut self, id: MessageId) {
        match id {
            MessageId::CreateEntity => self.create_entity += 1,
            MessageId::RemoveEntity => self.remove_entity += 1,
            MessageId::CreateComponents => self.create_components += 1,
            MessageId::UpdateComponents => self.update_components += 1,
            MessageId::RemoveComponents => self.remove_components += 1,
            MessageId::EntityIdCollision => self.id_collisions += 1,
        }
    }

    fn total(&self) -> u64 {
        self.create_entity
            + self.remove_entity
            + self.create_components
            + self.update_components
            + self.remove_components
            + self.id_collisions
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    clients: u32,
    entities: u32,
    ticks: u32,
    seed: u64,
    total_messages: u64,
    total_bytes: u64,
    create_entity: u64,
    remove_entity: u64,
    create_components: u64,
    update_components: u64,
    remove_components: u64,
    id_collisions: u64,
}

fn write_summary_json(out_dir: &Path, summary: &Summary) -> Result<()> {
    let path = out_dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary).context("serialize summary")?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// xorshift64* generator; deterministic for a given seed.
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn chance(&mut self, percent: u32) -> bool {
        self.next_u64() % 100 < u64::from(percent)
    }
}
