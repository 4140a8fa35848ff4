use anyhow::Result;
use mda_core::{
    Builder, EnrichedReply, FlowKey, MdaEvent, Network, NewLink, Probe, Response, ResponseData,
    TimeToLive, TimeoutData,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::SystemTime;

/// A router hop in a simulated topology.
enum SimHop {
    /// A hop which load-balances replies across interfaces by flow key.
    Balanced(Vec<IpAddr>),
    /// A hop which never replies.
    Unresponsive,
}

/// A simulated network in which each probe is answered immediately.
///
/// Hops are addressed by ttl starting at 1; any ttl beyond the configured
/// hops reaches the target.  Replies and timeouts are delivered strictly in
/// send order.
struct SimNetwork {
    hops: Vec<SimHop>,
    target: IpAddr,
    queue: VecDeque<Response>,
    inflight: HashMap<u8, usize>,
    peak_inflight: HashMap<u8, usize>,
}

impl SimNetwork {
    fn new(hops: Vec<SimHop>, target: IpAddr) -> Self {
        Self {
            hops,
            target,
            queue: VecDeque::new(),
            inflight: HashMap::new(),
            peak_inflight: HashMap::new(),
        }
    }

    fn peak_inflight(&self, ttl: u8) -> usize {
        self.peak_inflight.get(&ttl).copied().unwrap_or_default()
    }

    fn route(&self, probe: Probe) -> Response {
        match self.hops.get(usize::from(probe.ttl.0) - 1) {
            Some(SimHop::Balanced(addrs)) => {
                let addr = addrs[usize::from(probe.flow_key.0) % addrs.len()];
                Response::Reply(ResponseData::new(
                    SystemTime::now(),
                    addr,
                    probe.ttl,
                    probe.flow_key,
                ))
            }
            Some(SimHop::Unresponsive) => Response::Timeout(TimeoutData::new(
                SystemTime::now(),
                probe.ttl,
                probe.flow_key,
            )),
            None => Response::Reply(ResponseData::new(
                SystemTime::now(),
                self.target,
                probe.ttl,
                probe.flow_key,
            )),
        }
    }
}

impl Network for SimNetwork {
    fn send_probe(&mut self, probe: Probe) -> mda_core::Result<()> {
        let count = self.inflight.entry(probe.ttl.0).or_default();
        *count += 1;
        let peak = self.peak_inflight.entry(probe.ttl.0).or_default();
        *peak = (*peak).max(*count);
        let resp = self.route(probe);
        self.queue.push_back(resp);
        Ok(())
    }

    fn recv_event(&mut self) -> mda_core::Result<Option<Response>> {
        let resp = self.queue.pop_front();
        if let Some(resp) = &resp {
            let ttl = match resp {
                Response::Reply(data) => data.ttl,
                Response::Timeout(data) => data.ttl,
            };
            if let Some(count) = self.inflight.get_mut(&ttl.0) {
                *count = count.saturating_sub(1);
            }
        }
        Ok(resp)
    }
}

impl Network for &mut SimNetwork {
    fn send_probe(&mut self, probe: Probe) -> mda_core::Result<()> {
        (**self).send_probe(probe)
    }

    fn recv_event(&mut self) -> mda_core::Result<Option<Response>> {
        (**self).recv_event()
    }
}

/// A network which delivers every reply twice.
struct DuplicatingNetwork(SimNetwork);

impl Network for DuplicatingNetwork {
    fn send_probe(&mut self, probe: Probe) -> mda_core::Result<()> {
        self.0.send_probe(probe)?;
        if let Some(resp) = self.0.queue.back().cloned() {
            if matches!(resp, Response::Reply(_)) {
                self.0.queue.push_back(resp);
            }
        }
        Ok(())
    }

    fn recv_event(&mut self) -> mda_core::Result<Option<Response>> {
        Ok(self.0.queue.pop_front())
    }
}

/// The events observed during a run.
#[derive(Default)]
struct Observed {
    links: RefCell<Vec<NewLink>>,
    replies: RefCell<Vec<EnrichedReply>>,
    unanswered: RefCell<Vec<(TimeToLive, FlowKey)>>,
    ends: RefCell<usize>,
}

impl Observed {
    fn handler(&self) -> impl Fn(MdaEvent<'_>) + '_ {
        |event| match event {
            MdaEvent::NewLink(link) => self.links.borrow_mut().push(link),
            MdaEvent::ReplyProcessed(reply) => self.replies.borrow_mut().push(reply),
            MdaEvent::ProbeUnanswered { ttl, flow_key } => {
                self.unanswered.borrow_mut().push((ttl, flow_key));
            }
            MdaEvent::Ends(_) => *self.ends.borrow_mut() += 1,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn addr(addr: &str) -> IpAddr {
    IpAddr::V4(Ipv4Addr::from_str(addr).unwrap())
}

// required_probes(0.05, 1)
const PROBES_FOR_ONE: usize = 5;
// required_probes(0.05, 2)
const PROBES_FOR_TWO: usize = 8;

/// A single path of five hops: a chain of five nodes and four links.
#[test]
fn test_single_path_chain() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = (1..=4)
        .map(|i| SimHop::Balanced(vec![addr(&format!("10.0.{i}.1"))]))
        .collect();
    let observed = Observed::default();
    let mda = Builder::new(target).build()?;
    let lattice = mda.run_with(SimNetwork::new(hops, target), observed.handler())?;

    assert_eq!(5, lattice.node_count());
    assert_eq!(4, lattice.link_count());
    for ttl in 1..=4u8 {
        let nodes = lattice.nodes_at(TimeToLive(ttl)).collect::<Vec<_>>();
        assert_eq!(1, nodes.len());
        assert_eq!(PROBES_FOR_ONE, nodes[0].probes());
    }
    let target_nodes = lattice.nodes_at(TimeToLive(5)).collect::<Vec<_>>();
    assert_eq!(1, target_nodes.len());
    assert_eq!(target, target_nodes[0].addr());
    assert_eq!(1, target_nodes[0].probes());

    assert_eq!(4, observed.links.borrow().len());
    assert_eq!(4 * PROBES_FOR_ONE + 1, observed.replies.borrow().len());
    assert!(observed.unanswered.borrow().is_empty());
    assert_eq!(1, *observed.ends.borrow());
    Ok(())
}

/// A load balancer of degree two: both interfaces discovered and the
/// stopping rule satisfied only after at least `required_probes(0.05, 1)`
/// probes.
#[test]
fn test_degree_two_load_balancer() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = vec![SimHop::Balanced(vec![addr("10.0.1.1"), addr("10.0.1.2")])];
    let mda = Builder::new(target).build()?;
    let lattice = mda.run(SimNetwork::new(hops, target))?;

    let nodes = lattice.nodes_at(TimeToLive(1)).collect::<Vec<_>>();
    assert_eq!(2, nodes.len());
    let total_probes = nodes.iter().map(|node| node.probes()).sum::<usize>();
    assert!(total_probes >= PROBES_FOR_ONE);
    assert_eq!(PROBES_FOR_TWO, total_probes);
    // only the flow probed at the target links the balanced pair to it
    assert_eq!(1, lattice.link_count());
    Ok(())
}

/// An unresponsive hop becomes a gap and the trace continues beyond it.
#[test]
fn test_unresponsive_hop_gap() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = vec![
        SimHop::Unresponsive,
        SimHop::Balanced(vec![addr("10.0.2.1")]),
    ];
    let observed = Observed::default();
    let mda = Builder::new(target).build()?;
    let lattice = mda.run_with(SimNetwork::new(hops, target), observed.handler())?;

    assert!(lattice.is_gap(TimeToLive(1)));
    assert_eq!(3, observed.unanswered.borrow().len());
    assert_eq!(2, lattice.node_count());
    assert_eq!(1, lattice.nodes_at(TimeToLive(2)).count());
    assert_eq!(1, lattice.nodes_at(TimeToLive(3)).count());
    // no link can span the gap
    assert_eq!(1, lattice.link_count());
    assert!(lattice.to_string().contains("  1: *"));
    Ok(())
}

/// The in-flight cap holds even when the hop has more true interfaces than
/// the cap.
#[test]
fn test_inflight_cap() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = vec![SimHop::Balanced(vec![
        addr("10.0.1.1"),
        addr("10.0.1.2"),
        addr("10.0.1.3"),
        addr("10.0.1.4"),
    ])];
    let mda = Builder::new(target).max_branch(2).build()?;
    let mut network = SimNetwork::new(hops, target);
    let lattice = mda.run(&mut network)?;
    assert!(network.peak_inflight(1) <= 2);
    assert_eq!(4, lattice.nodes_at(TimeToLive(1)).count());
    Ok(())
}

/// A diamond topology: one router, a load-balanced pair, one router, then
/// the target.  Every edge of the diamond is discovered exactly once.
#[test]
fn test_diamond_links() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = vec![
        SimHop::Balanced(vec![addr("10.0.1.1")]),
        SimHop::Balanced(vec![addr("10.0.2.1"), addr("10.0.2.2")]),
        SimHop::Balanced(vec![addr("10.0.3.1")]),
    ];
    let observed = Observed::default();
    let mda = Builder::new(target).build()?;
    let lattice = mda.run_with(SimNetwork::new(hops, target), observed.handler())?;

    assert_eq!(5, lattice.node_count());
    let mut links = lattice
        .links()
        .map(|(src, dst)| (src.addr(), dst.addr()))
        .collect::<Vec<_>>();
    links.sort();
    let mut expected = vec![
        (addr("10.0.1.1"), addr("10.0.2.1")),
        (addr("10.0.1.1"), addr("10.0.2.2")),
        (addr("10.0.2.1"), addr("10.0.3.1")),
        (addr("10.0.2.2"), addr("10.0.3.1")),
        (addr("10.0.3.1"), target),
    ];
    expected.sort();
    assert_eq!(expected, links);
    // each link is published exactly once
    assert_eq!(lattice.link_count(), observed.links.borrow().len());
    Ok(())
}

/// Duplicate replies are processed once: no duplicate events and no double
/// counting in the lattice.
#[test]
fn test_duplicate_replies_ignored() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = vec![SimHop::Balanced(vec![addr("10.0.1.1")])];
    let observed = Observed::default();
    let mda = Builder::new(target).build()?;
    let network = DuplicatingNetwork(SimNetwork::new(hops, target));
    let lattice = mda.run_with(network, observed.handler())?;

    assert_eq!(PROBES_FOR_ONE + 1, observed.replies.borrow().len());
    let nodes = lattice.nodes_at(TimeToLive(1)).collect::<Vec<_>>();
    assert_eq!(PROBES_FOR_ONE, nodes[0].probes());
    Ok(())
}

/// An entirely unresponsive path is abandoned after the configured number
/// of consecutive gaps.
#[test]
fn test_all_gaps_abandoned() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let hops = (0..10).map(|_| SimHop::Unresponsive).collect();
    let mda = Builder::new(target).max_undiscovered(2).build()?;
    let lattice = mda.run(SimNetwork::new(hops, target))?;

    assert_eq!(0, lattice.node_count());
    assert_eq!(vec![TimeToLive(1), TimeToLive(2)], lattice.gaps().collect::<Vec<_>>());
    Ok(())
}

/// Round-trip delays are measured from probe send to reply receipt.
#[test]
fn test_reply_delay_measured() -> Result<()> {
    init_tracing();
    let target = addr("10.0.0.99");
    let observed = Observed::default();
    let mda = Builder::new(target).build()?;
    mda.run_with(SimNetwork::new(vec![], target), observed.handler())?;

    let replies = observed.replies.borrow();
    assert_eq!(1, replies.len());
    assert_eq!(target, replies[0].addr);
    assert_eq!(TimeToLive(1), replies[0].probe.ttl);
    assert!(replies[0].received >= replies[0].probe.sent);
    Ok(())
}
