//! End-to-end scenario tests driving `TransactionAgent`'s real mailbox
//! and event loop through the in-memory fakes in `lock_agent::testing`.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::async_std::{channel, task};

use lock_agent::testing::{NoopNodeMonitor, RecordingLockServer, RecordingPeerBus};
use lock_agent::{
    lock_spec, AgentError, AgentHandle, AgentId, AgentMessage, ClientCommand, ClientId, Entry, LockInfo, LockOutcome,
    LockSpec, LockStateUpdate, Mode, NodeId, ObjectId, QueueElement, Quorum, RawLock, TransactionAgent,
    TransactionAgentConfig,
};

fn objid(s: &str) -> ObjectId {
    ObjectId::new(vec![s]).unwrap()
}

fn node_set(names: &[&str]) -> BTreeSet<NodeId> {
    names.iter().map(|n| n.to_string()).collect()
}

fn write_queue(entries: &[AgentId]) -> Vec<QueueElement> {
    entries
        .iter()
        .map(|&agent| QueueElement::Write(Entry { agent, version: 1 }))
        .collect()
}

fn read_queue(entries: &[AgentId]) -> Vec<QueueElement> {
    vec![QueueElement::Read(
        entries.iter().map(|&agent| Entry { agent, version: 1 }).collect(),
    )]
}

fn snapshot(object: &str, node: &str, version: u64, queue: Vec<QueueElement>) -> LockStateUpdate {
    LockStateUpdate {
        lock: RawLock {
            object: objid(object),
            version,
            queue,
        },
        node: node.to_string(),
        note: None,
    }
}

fn spawn_agent(config: TransactionAgentConfig) -> (AgentHandle, Arc<RecordingLockServer>, Arc<RecordingPeerBus>) {
    let server = Arc::new(RecordingLockServer::default());
    let peers = Arc::new(RecordingPeerBus::default());
    let monitor = Arc::new(NoopNodeMonitor::default());
    let handle = TransactionAgent::start(config, server.clone(), peers.clone(), monitor);
    (handle, server, peers)
}

async fn lock_info(handle: &AgentHandle) -> LockInfo {
    let (tx, rx) = channel::unbounded();
    handle.send(AgentMessage::Client(ClientCommand::LockInfo { reply: tx })).await;
    rx.recv().await.expect("agent still running")
}

async fn issue_lock(
    handle: &AgentHandle,
    spec: LockSpec,
    wait: bool,
) -> channel::Receiver<Result<LockOutcome, AgentError>> {
    let (tx, rx) = channel::unbounded();
    handle
        .send(AgentMessage::Client(ClientCommand::Lock { spec, wait, reply: tx }))
        .await;
    rx
}

fn self_agent_id(server: &RecordingLockServer) -> AgentId {
    server.lock_calls.lock().unwrap().last().expect("a lock() call was recorded").2
}

#[test]
fn single_local_lock() {
    task::block_on(async {
        let (handle, server, _peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        let reply = issue_lock(
            &handle,
            lock_spec(objid("o1"), Mode::Write, node_set(&["N1"]), Quorum::All),
            true,
        )
        .await;
        lock_info(&handle).await; // barrier: the SendLockRequest effect has landed in server.lock_calls.

        let me = self_agent_id(&server);
        handle
            .send(AgentMessage::LockUpdate(snapshot("o1", "N1", 1, write_queue(&[me]))))
            .await;

        match reply.recv().await.expect("agent alive") {
            Ok(LockOutcome::HaveAll(deadlocks)) => assert!(deadlocks.is_empty()),
            other => panic!("expected HaveAll([]), got {:?}", other),
        }

        let info = lock_info(&handle).await;
        assert_eq!(info.claim_no, 1);
        assert!(info.have_all);
    });
}

#[test]
fn quorum_majority_succeeds_with_one_node_down() {
    task::block_on(async {
        let (handle, server, _peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        let reply = issue_lock(
            &handle,
            lock_spec(objid("o2"), Mode::Read, node_set(&["N1", "N2", "N3"]), Quorum::Majority),
            true,
        )
        .await;
        handle.send(AgentMessage::LockServerDown("N2".to_string())).await;
        lock_info(&handle).await;

        let me = self_agent_id(&server);
        handle
            .send(AgentMessage::LockUpdate(snapshot("o2", "N1", 1, read_queue(&[me]))))
            .await;
        handle
            .send(AgentMessage::LockUpdate(snapshot("o2", "N3", 1, read_queue(&[me]))))
            .await;

        match reply.recv().await.expect("agent alive") {
            Ok(LockOutcome::HaveAll(deadlocks)) => assert!(deadlocks.is_empty()),
            other => panic!("expected HaveAll([]), got {:?}", other),
        }
    });
}

#[test]
fn conflicting_upgrade_purges_and_reacquires() {
    task::block_on(async {
        let (handle, server, _peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        let read_reply = issue_lock(
            &handle,
            lock_spec(objid("o3"), Mode::Read, node_set(&["N1"]), Quorum::All),
            true,
        )
        .await;
        lock_info(&handle).await;
        let me = self_agent_id(&server);
        handle
            .send(AgentMessage::LockUpdate(snapshot("o3", "N1", 1, read_queue(&[me]))))
            .await;
        assert!(matches!(read_reply.recv().await, Ok(Ok(LockOutcome::HaveAll(_)))));

        let write_reply = issue_lock(
            &handle,
            lock_spec(objid("o3"), Mode::Write, node_set(&["N1"]), Quorum::All),
            false,
        )
        .await;
        assert!(matches!(write_reply.recv().await, Ok(Ok(LockOutcome::Accepted))));

        let info = lock_info(&handle).await;
        assert!(!info.have_all, "upgrade should have reset have_all");
        assert!(info.locks.iter().all(|(id, _)| id.object != objid("o3")), "stale snapshot must be purged");
        assert!(info.pending.iter().any(|(obj, _)| *obj == objid("o3")));

        let calls = server.lock_calls.lock().unwrap();
        let o3_calls: Vec<_> = calls.iter().filter(|(_, obj, _, _)| *obj == objid("o3")).collect();
        assert_eq!(o3_calls.len(), 2, "read then write should each emit a SendLockRequest");
        assert_eq!(o3_calls[1].3, Mode::Write);
    });
}

#[test]
fn two_agent_deadlock_self_is_victim_surrenders() {
    task::block_on(async {
        let (handle, server, peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        // Learn our own id first.
        issue_lock(
            &handle,
            lock_spec(objid("o4"), Mode::Write, node_set(&["N1"]), Quorum::All),
            false,
        )
        .await;
        lock_info(&handle).await;
        let me = self_agent_id(&server);
        // A peer id guaranteed smaller than ours (pid << 32 | seq is never zero),
        // so the victim comparison always picks us.
        let peer = AgentId::from_raw(0);

        handle
            .send(AgentMessage::LockUpdate(snapshot("o4", "N1", 1, write_queue(&[me, peer]))))
            .await;
        handle
            .send(AgentMessage::LockUpdate(snapshot("o5", "N1", 1, write_queue(&[peer, me]))))
            .await;
        lock_info(&handle).await;

        assert!(server.surrender_calls.lock().unwrap().contains(&("N1".to_string(), objid("o4"))));
        let info = lock_info(&handle).await;
        assert!(info.locks.iter().all(|(id, _)| !(id.object == objid("o4") && id.node == "N1")));
        let _ = peers;
    });
}

#[test]
fn two_agent_deadlock_self_survives_and_reaches_have_all() {
    task::block_on(async {
        let (handle, server, _peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        issue_lock(
            &handle,
            lock_spec(objid("o4"), Mode::Write, node_set(&["N1"]), Quorum::All),
            false,
        )
        .await;
        lock_info(&handle).await;
        let me = self_agent_id(&server);
        // A peer id guaranteed larger than ours, so the peer is picked as victim.
        let peer = AgentId::from_raw(u64::MAX);

        let reply = issue_lock(
            &handle,
            lock_spec(objid("o5"), Mode::Write, node_set(&["N1"]), Quorum::All),
            true,
        )
        .await;

        handle
            .send(AgentMessage::LockUpdate(snapshot("o4", "N1", 1, write_queue(&[me, peer]))))
            .await;
        handle
            .send(AgentMessage::LockUpdate(snapshot("o5", "N1", 1, write_queue(&[peer, me]))))
            .await;
        lock_info(&handle).await;

        let info = lock_info(&handle).await;
        assert_eq!(info.deadlocks, vec![(peer, lock_agent::LockId::new(objid("o5"), "N1".to_string()))]);

        // The peer's own agent eventually surrenders o5 to the lock server and
        // tells us directly, since we are already in its queue the lock server
        // will also resend a fresher snapshot naming only us as the holder.
        handle
            .send(AgentMessage::PeerSurrendered {
                sender: peer,
                lock_id: lock_agent::LockId::new(objid("o5"), "N1".to_string()),
            })
            .await;
        handle
            .send(AgentMessage::LockUpdate(snapshot("o5", "N1", 2, write_queue(&[me]))))
            .await;

        match reply.recv().await.expect("agent alive") {
            Ok(LockOutcome::HaveAll(deadlocks)) => assert_eq!(deadlocks, vec![(peer, lock_agent::LockId::new(objid("o5"), "N1".to_string()))]),
            other => panic!("expected HaveAll with the recorded deadlock, got {:?}", other),
        }
        let _ = server;
    });
}

#[test]
fn node_loss_without_await_nodes_aborts() {
    task::block_on(async {
        let (handle, server, _peers) = spawn_agent(TransactionAgentConfig::new(ClientId::new()));

        let reply = issue_lock(
            &handle,
            lock_spec(objid("o6"), Mode::Write, node_set(&["N1", "N2"]), Quorum::All),
            true,
        )
        .await;
        lock_info(&handle).await;
        let me = self_agent_id(&server);
        handle
            .send(AgentMessage::LockUpdate(snapshot("o6", "N1", 1, write_queue(&[me]))))
            .await;
        handle.send(AgentMessage::LockServerDown("N2".to_string())).await;

        // The agent aborts and terminates; no reply is ever sent for the
        // pending wait, so the client observes a closed channel instead.
        // This is the linked-client-receives-the-exit-signal path.
        assert!(reply.recv().await.is_err());
    });
}

#[test]
fn node_loss_with_await_nodes_recovers() {
    task::block_on(async {
        let mut config = TransactionAgentConfig::new(ClientId::new());
        config.await_nodes = true;
        let (handle, server, _peers) = spawn_agent(config);

        let reply = issue_lock(
            &handle,
            lock_spec(objid("o6"), Mode::Write, node_set(&["N1", "N2"]), Quorum::All),
            true,
        )
        .await;
        lock_info(&handle).await;
        let me = self_agent_id(&server);
        handle
            .send(AgentMessage::LockUpdate(snapshot("o6", "N1", 1, write_queue(&[me]))))
            .await;
        handle.send(AgentMessage::LockServerDown("N2".to_string())).await;
        lock_info(&handle).await;

        let info = lock_info(&handle).await;
        assert!(info.pending.iter().any(|(obj, _)| *obj == objid("o6")));

        handle.send(AgentMessage::LocksRunning("N2".to_string())).await;
        lock_info(&handle).await;

        let calls = server.lock_calls.lock().unwrap();
        assert!(calls.iter().any(|(node, obj, _, mode)| node == "N2" && *obj == objid("o6") && *mode == Mode::Write));
        drop(calls);

        handle
            .send(AgentMessage::LockUpdate(snapshot("o6", "N2", 1, write_queue(&[me]))))
            .await;

        match reply.recv().await.expect("agent alive") {
            Ok(LockOutcome::HaveAll(deadlocks)) => assert!(deadlocks.is_empty()),
            other => panic!("expected HaveAll([]), got {:?}", other),
        }
    });
}
