use std::time::Duration;

use voxelnet::protocol::{InputFlags, PlayerInput};
use voxelnet::{
    BlockRegistry, Client, ClientState, Configuration, QueueEventBus, Server, SimpleEntityStore,
    World, WorldWriter, ENTITY_ID_NONE,
};

const STEP: f32 = 1.0 / 60.0;

fn drive<F: FnMut() -> bool>(max_steps: u32, mut done: F) -> bool {
    for _ in 0..max_steps {
        if done() {
            return true;
        }
    }
    false
}

#[test]
fn handshake_establishes_a_player_entity_on_both_sides() {
    let mut server_world = World::new(BlockRegistry::default());
    let mut entities = SimpleEntityStore::default();
    let mut events = QueueEventBus::default();
    let mut server = Server::new(0, Configuration::default()).unwrap();
    server.set_world(&mut server_world);
    server.set_entities(&mut entities);
    server.set_events(&mut events);
    server.initialize();

    let mut client_world = World::new(BlockRegistry::default());
    let mut client = Client::new("nushu".to_string(), Configuration::default()).unwrap();
    client.set_world(&mut client_world);
    client
        .connect(&server.local_addr().ip().to_string(), server.local_addr().port())
        .unwrap();

    let reached = drive(600, || {
        server.update(STEP);
        client.update(STEP);
        client.connection_state() == ClientState::Connected
    });

    assert!(reached, "client never reached Connected state");
    assert_eq!(server.connected_client_count(), 1);
    assert_ne!(client.local_player_id(), ENTITY_ID_NONE);
    assert_eq!(server.entity_count(), 1);
}

#[test]
fn rejects_handshake_once_max_clients_is_reached() {
    let mut config = Configuration::default();
    config.max_clients = 1;

    let mut server_world = World::new(BlockRegistry::default());
    let mut entities = SimpleEntityStore::default();
    let mut events = QueueEventBus::default();
    let mut server = Server::new(0, config).unwrap();
    server.set_world(&mut server_world);
    server.set_entities(&mut entities);
    server.set_events(&mut events);
    server.initialize();

    let mut first_world = World::new(BlockRegistry::default());
    let mut first = Client::new("first".to_string(), Configuration::default()).unwrap();
    first.set_world(&mut first_world);
    first
        .connect(&server.local_addr().ip().to_string(), server.local_addr().port())
        .unwrap();

    drive(600, || {
        server.update(STEP);
        first.update(STEP);
        first.connection_state() == ClientState::Connected
    });
    assert_eq!(first.connection_state(), ClientState::Connected);

    let mut second_world = World::new(BlockRegistry::default());
    let mut second = Client::new("second".to_string(), Configuration::default()).unwrap();
    second.set_world(&mut second_world);
    second
        .connect(&server.local_addr().ip().to_string(), server.local_addr().port())
        .unwrap();

    let rejected = drive(600, || {
        server.update(STEP);
        first.update(STEP);
        second.update(STEP);
        second.connection_state() == ClientState::Disconnected
    });

    assert!(rejected, "server accepted a client past max_clients");
    assert_eq!(server.connected_client_count(), 1);
}

#[test]
fn chunk_request_round_trips_server_block_edits_to_the_client() {
    let mut server_world = World::new(BlockRegistry::default());
    server_world.get_or_create_chunk(0, 0).set_block(3, 5, 7, 9);

    let mut entities = SimpleEntityStore::default();
    let mut events = QueueEventBus::default();
    let mut server = Server::new(0, Configuration::default()).unwrap();
    server.set_world(&mut server_world);
    server.set_entities(&mut entities);
    server.set_events(&mut events);
    server.initialize();

    let mut client_world = World::new(BlockRegistry::default());
    let mut client = Client::new("surveyor".to_string(), Configuration::default()).unwrap();
    client.set_world(&mut client_world);
    client
        .connect(&server.local_addr().ip().to_string(), server.local_addr().port())
        .unwrap();

    drive(600, || {
        server.update(STEP);
        client.update(STEP);
        client.connection_state() == ClientState::Connected
    });
    assert_eq!(client.connection_state(), ClientState::Connected);

    client.request_chunk(0, 0);

    drive(600, || {
        server.update(STEP);
        client.update(STEP);
        client
            .world()
            .unwrap()
            .get_chunk(0, 0)
            .is_some_and(|chunk| chunk.get_block(3, 5, 7) == 9)
    });

    let chunk = client.world().unwrap().get_chunk(0, 0).expect("chunk never arrived");
    assert_eq!(chunk.get_block(3, 5, 7), 9);
}

#[test]
fn player_input_moves_the_server_side_entity() {
    let mut server_world = World::new(BlockRegistry::default());
    let mut entities = SimpleEntityStore::default();
    let mut events = QueueEventBus::default();
    let mut server = Server::new(0, Configuration::default()).unwrap();
    server.set_world(&mut server_world);
    server.set_entities(&mut entities);
    server.set_events(&mut events);
    server.initialize();

    let mut client_world = World::new(BlockRegistry::default());
    let mut client = Client::new("runner".to_string(), Configuration::default()).unwrap();
    client.set_world(&mut client_world);
    client
        .connect(&server.local_addr().ip().to_string(), server.local_addr().port())
        .unwrap();

    drive(600, || {
        server.update(STEP);
        client.update(STEP);
        client.connection_state() == ClientState::Connected
    });

    let start = client.predicted_position();

    for _ in 0..120 {
        server.update(STEP);
        client.send_input(PlayerInput {
            sequence: 0,
            delta_time: STEP,
            wish_direction: glam::Vec3::new(0.0, 0.0, -1.0),
            flags: InputFlags::empty(),
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            action_flags: 0,
        });
        client.update(STEP);
        std::thread::sleep(Duration::from_micros(100));
    }

    let end = client.predicted_position();
    assert!(
        (end - start).length() > 0.1,
        "predicted position did not move under sustained input: {start} -> {end}"
    );
}
