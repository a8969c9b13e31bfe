#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use docgraph_database::basic_db::{InnerDatabase, SafeDatabase};
use docgraph_service::external::{ManualClock, MemoryLedger, Treasury};
use docgraph_service::governance::{Collaborators, Dao, Outcome, ProposalKind, VoteChoice};
use docgraph_service::parser::{Asset, Checksum256, ContentGroup, Document, Name};
use docgraph_service::DaoConfig;

pub const VOTING_SECS: i64 = 60;

/// Everything a test needs, passed around explicitly.
pub struct Environment {
    pub dao: Dao<InnerDatabase>,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<MemoryLedger>,
    pub whale: Name,
    pub members: Vec<Name>,
    pub genesis: DateTime<Utc>,
    _dir: tempfile::TempDir,
}

pub fn name(value: &str) -> Name {
    Name::new(value).unwrap()
}

pub fn asset(value: &str) -> Asset {
    value.parse().unwrap()
}

pub fn setup() -> Environment {
    setup_with(|ledger| -> Arc<dyn Treasury> { ledger.clone() })
}

/// Like [`setup`], paying claims through the treasury built by `treasury`.
pub fn setup_with(treasury: impl FnOnce(&Arc<MemoryLedger>) -> Arc<dyn Treasury>) -> Environment {
    let dir = tempfile::tempdir().unwrap();
    let genesis = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(genesis));

    let ledger = Arc::new(MemoryLedger::new("HVOICE", 2));
    ledger.register("HUSD", 2);
    ledger.register("HYPHA", 2);
    ledger.register("SEEDS", 4);

    let whale = name("whale");
    let members = vec![name("member1"), name("member2"), name("member3")];
    ledger.set_balance(&whale, asset("100.00 HVOICE"));
    for member in &members {
        ledger.set_balance(member, asset("1.00 HVOICE"));
    }

    let config = DaoConfig {
        voting_duration_secs: VOTING_SECS as u64,
        ..DaoConfig::default()
    };
    let dao = Dao::open(
        InnerDatabase::new(dir.path()).unwrap(),
        config,
        Collaborators {
            clock: clock.clone(),
            voting_power: ledger.clone(),
            treasury: treasury(&ledger),
        },
    )
    .unwrap();

    dao.enroll(&whale).unwrap();
    for member in &members {
        dao.enroll(member).unwrap();
    }

    Environment { dao, clock, ledger, whale, members, genesis, _dir: dir }
}

impl Environment {
    pub fn member_doc(&self, account: &Name) -> Document {
        self.dao.member(account).unwrap()
    }

    pub fn edge(&self, from: &Document, to: &Document, name: &str) -> bool {
        self.dao.store().edge_exists(&from.hash, &to.hash, name).unwrap()
    }

    pub fn lapse_voting(&self) {
        self.clock.advance(Duration::seconds(VOTING_SECS + 1));
    }

    pub fn vote_all_pass(&self, proposal: &Checksum256) {
        self.dao.vote(&self.whale, proposal, VoteChoice::Pass).unwrap();
        for member in &self.members {
            self.dao.vote(member, proposal, VoteChoice::Pass).unwrap();
        }
    }

    /// Proposes, passes and closes a role.
    pub fn create_role(&self, proposer: &Name, closer: &Name, title: &str) -> Document {
        let role = self
            .dao
            .propose(proposer, ProposalKind::Role, role_content(title))
            .unwrap();
        self.vote_all_pass(&role.hash);
        self.lapse_voting();

        let closure = self.dao.close_proposal(closer, &role.hash).unwrap();
        assert_eq!(closure.outcome, Outcome::Passed);

        let root = self.dao.root();
        assert!(self.edge(root, &role, "role"));
        assert!(self.edge(root, &role, "passedprops"));
        role
    }

    /// Adds daily periods starting at genesis.
    pub fn add_periods(&self, count: i64) -> Vec<Document> {
        (0..count)
            .map(|day| {
                self.dao
                    .add_period(self.genesis + Duration::days(day), &format!("day {day}"))
                    .unwrap()
            })
            .collect()
    }
}

pub fn role_content(title: &str) -> Vec<ContentGroup> {
    vec![ContentGroup::labeled("details")
        .with("title", title)
        .with("description", "weaves baskets under water")
        .with("annual_usd_salary", asset("150000.00 USD"))]
}

pub fn expected_tally(pass: &str, fail: &str) -> Vec<ContentGroup> {
    vec![
        ContentGroup::labeled("pass").with("vote_power", asset(pass)),
        ContentGroup::labeled("fail").with("vote_power", asset(fail)),
    ]
}

pub fn expected_vote(voter: &str, power: &str, vote: &str) -> Vec<ContentGroup> {
    vec![ContentGroup::new()
        .with("voter", name(voter))
        .with("vote_power", asset(power))
        .with("vote", vote)]
}
