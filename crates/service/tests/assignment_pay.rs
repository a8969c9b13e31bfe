mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;
use common::*;
use docgraph_service::error::Result;
use docgraph_service::external::{BalanceLookup, MemoryLedger, Treasury};
use docgraph_service::governance::{Outcome, ProposalKind, ProposalState};
use docgraph_service::parser::{Asset, Checksum256, ContentGroup, Document, Name};
use docgraph_service::DaoError;

struct Assigned {
    role: Document,
    periods: Vec<Document>,
    assignment: Document,
}

fn assignment_content(role: &Document, start_period: &Document, share: i64) -> Vec<ContentGroup> {
    vec![ContentGroup::labeled("details")
        .with("title", "Basketweaver for the spring")
        .with("assignee", name("member2"))
        .with("role", role.hash)
        .with("start_period", start_period.hash)
        .with("time_share_x100", share)
        .with("min_time_share_x100", 50_i64)
        .with("husd_salary_per_phase", asset("1000.00 HUSD"))
        .with("hypha_salary_per_phase", asset("200.00 HYPHA"))]
}

fn adjustment(assignment: &Checksum256, share: i64) -> Vec<ContentGroup> {
    vec![ContentGroup::labeled("details")
        .with("assignment", *assignment)
        .with("new_time_share_x100", share)]
}

fn assign(env: &Environment) -> Assigned {
    let periods = env.add_periods(4);
    let role = env.create_role(&env.members[0], &env.members[2], "Underwater Basketweaver");

    let assignment = env
        .dao
        .propose(&env.members[1], ProposalKind::Assignment, assignment_content(&role, &periods[0], 100))
        .unwrap();
    env.vote_all_pass(&assignment.hash);
    env.lapse_voting();
    let closure = env.dao.close_proposal(&env.members[2], &assignment.hash).unwrap();
    assert_eq!(closure.outcome, Outcome::Passed);

    Assigned { role, periods, assignment }
}

/// Passes an edit retitling `assignment` and returns the merged copy.
fn edit_assignment(env: &Environment, assignment: &Document) -> Document {
    let edit = env
        .dao
        .propose(
            &env.members[0],
            ProposalKind::Edit,
            vec![ContentGroup::labeled("details")
                .with("title", "Basketweaver for the summer")
                .with("original_document", assignment.hash)],
        )
        .unwrap();
    env.vote_all_pass(&edit.hash);
    env.lapse_voting();
    let closure = env.dao.close_proposal(&env.members[2], &edit.hash).unwrap();
    assert_eq!(closure.outcome, Outcome::Passed);
    closure.document
}

/// Ledger-backed treasury that refuses HYPHA payouts while `failing` is set.
struct FlakyTreasury {
    ledger: Arc<MemoryLedger>,
    failing: AtomicBool,
}

impl BalanceLookup for FlakyTreasury {
    fn balance(&self, account: &Name, symbol: &str) -> Result<Asset> {
        self.ledger.balance(account, symbol)
    }
}

impl Treasury for FlakyTreasury {
    fn credit_all(&self, account: &Name, amounts: &[Asset]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) && amounts.iter().any(|amount| amount.symbol() == "HYPHA") {
            return Err(DaoError::InvalidContent("HYPHA treasury unavailable".to_string()));
        }
        self.ledger.credit_all(account, amounts)
    }

    fn revert_all(&self, account: &Name, amounts: &[Asset]) -> Result<()> {
        self.ledger.revert_all(account, amounts)
    }
}

#[test]
fn test_assignment_links_role_and_assignee() {
    let env = setup();
    let Assigned { role, periods, assignment } = assign(&env);
    let assignee = env.member_doc(&env.members[1]);

    assert!(env.edge(&assignee, &assignment, "assigned"));
    assert!(env.edge(&assignment, &assignee, "assignee"));
    assert!(env.edge(&assignment, &role, "role"));
    assert!(env.edge(&role, &assignment, "assignment"));
    assert!(env.edge(&assignment, &periods[0], "start"));
    assert!(env.edge(env.dao.root(), &assignment, "passedprops"));

    let share = env.dao.current_time_share(&assignment.hash).unwrap();
    assert_eq!(share.share, 100);
    assert_eq!(share.start, env.genesis);
    assert_eq!(env.dao.time_share_history(&assignment.hash).unwrap(), vec![share]);
}

#[test]
fn test_assignment_requires_approved_role() {
    let env = setup();
    let periods = env.add_periods(1);
    let draft = env
        .dao
        .propose(&env.members[0], ProposalKind::Role, role_content("Gardener"))
        .unwrap();

    let err = env
        .dao
        .propose(&env.members[1], ProposalKind::Assignment, assignment_content(&draft, &periods[0], 100))
        .unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));
}

#[test]
fn test_periods_chain_and_elapse() {
    let env = setup();
    let periods = env.add_periods(3);

    assert_eq!(env.dao.next_period(&periods[0].hash).unwrap().unwrap().hash, periods[1].hash);
    assert!(env.dao.next_period(&periods[2].hash).unwrap().is_none());
    assert_eq!(
        env.dao.period_end(&periods[0].hash).unwrap(),
        Some(env.genesis + Duration::days(1))
    );

    assert!(!env.dao.is_period_elapsed(&periods[0].hash).unwrap());
    env.clock.set(env.genesis + Duration::days(1));
    assert!(env.dao.is_period_elapsed(&periods[0].hash).unwrap());
    assert!(!env.dao.is_period_elapsed(&periods[1].hash).unwrap());

    // the last period stays open until a successor exists
    env.clock.set(env.genesis + Duration::days(30));
    assert!(!env.dao.is_period_elapsed(&periods[2].hash).unwrap());

    let err = env.dao.add_period(env.genesis, "again").unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));
}

#[test]
fn test_claim_pays_each_period_once() {
    let env = setup();
    let Assigned { periods, assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();

    let err = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::PeriodNotElapsed { .. }));
    assert!(err.is_transient());

    env.clock.set(env.genesis + Duration::days(1));
    let receipt = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[0].hash);
    assert_eq!(receipt.amounts, vec![asset("1000.00 HUSD"), asset("200.00 HYPHA")]);
    assert_eq!(
        receipt.payment.get("payment", "husd_amount").and_then(|value| value.as_asset()),
        Some(&asset("1000.00 HUSD"))
    );
    assert!(env.edge(&assignment, &periods[0], "claimed"));
    assert!(env.edge(&assignment, &receipt.payment, "payment"));
    assert!(env.edge(&env.member_doc(&assignee), &receipt.payment, "payment"));
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("1000.00 HUSD"));
    assert_eq!(env.ledger.balance(&assignee, "HYPHA").unwrap(), asset("200.00 HYPHA"));

    // the next period has not ended yet
    let err = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::PeriodNotElapsed { period, .. } if period == periods[1].hash));
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("1000.00 HUSD"));

    let err = env.dao.claim_next_period(&env.members[0], &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::Unauthorized { .. }));
}

#[test]
fn test_adjusted_commitment_prorates_pay() {
    let env = setup();
    let Assigned { periods, assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();

    env.clock.set(env.genesis + Duration::days(1));
    env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();

    // half way through the second period
    env.clock.set(env.genesis + Duration::hours(36));
    let next = env.dao.adjust_commitment(&assignee, adjustment(&assignment.hash, 50)).unwrap();
    let current = env.dao.current_time_share(&assignment.hash).unwrap();
    assert_eq!(current.hash, next.hash);
    assert_eq!(current.share, 50);
    assert_eq!(current.start, env.genesis + Duration::hours(36));
    assert_eq!(env.dao.time_share_history(&assignment.hash).unwrap().len(), 2);

    env.clock.set(env.genesis + Duration::days(2));
    let receipt = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[1].hash);
    assert_eq!(receipt.amounts, vec![asset("750.00 HUSD"), asset("150.00 HYPHA")]);
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("1750.00 HUSD"));

    // a whole period at the reduced share
    env.clock.set(env.genesis + Duration::days(3));
    let receipt = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[2].hash);
    assert_eq!(receipt.amounts, vec![asset("500.00 HUSD"), asset("100.00 HYPHA")]);
}

#[test]
fn test_adjust_commitment_rejections() {
    let env = setup();
    let Assigned { assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();
    env.clock.set(env.genesis + Duration::hours(12));

    let err = env
        .dao
        .adjust_commitment(&env.members[0], adjustment(&assignment.hash, 60))
        .unwrap_err();
    assert!(matches!(err, DaoError::Unauthorized { .. }));

    let err = env
        .dao
        .adjust_commitment(&assignee, adjustment(&assignment.hash, 40))
        .unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));

    let err = env
        .dao
        .adjust_commitment(&assignee, adjustment(&assignment.hash, 101))
        .unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));

    env.dao.adjust_commitment(&assignee, adjustment(&assignment.hash, 60)).unwrap();

    // a change must start after the current one
    let mut backdated = adjustment(&assignment.hash, 70);
    backdated[0].set("fixed_start_date", env.genesis.into());
    let err = env.dao.adjust_commitment(&assignee, backdated).unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));

    let err = env
        .dao
        .adjust_commitment(&assignee, adjustment(&env.dao.root().hash, 60))
        .unwrap_err();
    assert!(matches!(err, DaoError::NotFound(_) | DaoError::InvalidContent(_)));
}

#[test]
fn test_failed_payout_leaves_period_claimable() {
    let mut treasury = None;
    let env = setup_with(|ledger| -> Arc<dyn Treasury> {
        let flaky = Arc::new(FlakyTreasury { ledger: ledger.clone(), failing: AtomicBool::new(true) });
        treasury = Some(flaky.clone());
        flaky
    });
    let treasury = treasury.unwrap();
    let Assigned { periods, assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();

    env.clock.set(env.genesis + Duration::days(1));
    let err = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::InvalidContent(_)));
    assert!(!env.dao.is_claimed(&assignment.hash, &periods[0].hash).unwrap());
    assert!(env.dao.last_claimed_period(&assignment.hash).unwrap().is_none());
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("0.00 HUSD"));

    treasury.failing.store(false, Ordering::SeqCst);
    let receipt = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[0].hash);
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("1000.00 HUSD"));
    assert_eq!(env.ledger.balance(&assignee, "HYPHA").unwrap(), asset("200.00 HYPHA"));
}

#[test]
fn test_edited_assignment_pays_each_period_once() {
    let env = setup();
    let Assigned { periods, assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();

    env.clock.set(env.genesis + Duration::days(1));
    env.dao.claim_next_period(&assignee, &assignment.hash).unwrap();

    let merged = edit_assignment(&env, &assignment);
    assert!(env.edge(&merged, &periods[0], "claimed"));
    assert_eq!(env.dao.proposal_state(&assignment.hash).unwrap(), ProposalState::Superseded);

    env.clock.set(env.genesis + Duration::days(2));
    let err = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::Superseded { replacement, .. } if replacement == merged.hash));
    let err = env
        .dao
        .adjust_commitment(&assignee, adjustment(&assignment.hash, 60))
        .unwrap_err();
    assert!(matches!(err, DaoError::Superseded { .. }));

    let receipt = env.dao.claim_next_period(&assignee, &merged.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[1].hash);
    let err = env.dao.claim_next_period(&assignee, &merged.hash).unwrap_err();
    assert!(matches!(err, DaoError::PeriodNotElapsed { period, .. } if period == periods[2].hash));

    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("2000.00 HUSD"));
}

#[test]
fn test_claim_after_edit_goes_through_replacement() {
    let env = setup();
    let Assigned { periods, assignment, .. } = assign(&env);
    let assignee = env.members[1].clone();
    let merged = edit_assignment(&env, &assignment);

    env.clock.set(env.genesis + Duration::days(1));
    let err = env.dao.claim_next_period(&assignee, &assignment.hash).unwrap_err();
    assert!(matches!(err, DaoError::Superseded { .. }));

    let receipt = env.dao.claim_next_period(&assignee, &merged.hash).unwrap();
    assert_eq!(receipt.period.hash, periods[0].hash);
    assert!(!env.dao.is_claimed(&assignment.hash, &periods[0].hash).unwrap());
    assert_eq!(env.ledger.balance(&assignee, "HUSD").unwrap(), asset("1000.00 HUSD"));
    assert_eq!(env.ledger.balance(&assignee, "HYPHA").unwrap(), asset("200.00 HYPHA"));
}
