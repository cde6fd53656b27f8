//! Human-readable listing of transaction proposals

use crate::amount::{self, Unit};
use crate::client::{ActionType, TxProposal};

/// Render proposals as indented lines, in the order given.
///
/// Each proposal gets a summary line, an actions line when anyone has voted,
/// and a line saying how many signatures are still missing.
pub fn render_proposals(proposals: &[TxProposal], unit: Unit) -> Vec<String> {
    let mut lines = Vec::with_capacity(proposals.len() * 3);

    for proposal in proposals {
        let to_address = proposal
            .outputs
            .first()
            .map(|o| o.to_address.as_str())
            .unwrap_or_default();
        lines.push(format!(
            "\t{} [\"{}\" by {}] {} => {}",
            proposal.short_id(),
            proposal.message.as_deref().unwrap_or_default(),
            proposal.creator_name,
            amount::render(proposal.amount, unit),
            to_address
        ));

        if !proposal.actions.is_empty() {
            let actions: Vec<String> = proposal
                .actions
                .iter()
                .map(|a| {
                    let mark = match a.action_type {
                        ActionType::Accept => '✓',
                        ActionType::Reject => '✗',
                    };
                    match &a.comment {
                        Some(comment) => format!("{} {} ({})", a.copayer_name, mark, comment),
                        None => format!("{} {}", a.copayer_name, mark),
                    }
                })
                .collect();
            lines.push(format!("\t\tActions: {}", actions.join(". ")));
        }

        match proposal.missing_signatures() {
            0 => lines.push("\t\tReady to broadcast".to_string()),
            missing => lines.push(format!("\t\tMissing signatures: {}", missing)),
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::fixtures::proposal;
    use crate::client::ProposalAction;

    #[test]
    fn test_missing_signatures_line() {
        let lines = render_proposals(&[proposal("5f2a9c01aaaa", 2, 1)], Unit::Bit);
        assert_eq!(
            lines,
            vec![
                "\taaaa [\"rent\" by Drew] 1.5 bit => 1BoatSLRHtKNngkdXEeobR76b53LETtpyT",
                "\t\tActions: copayer0 ✓",
                "\t\tMissing signatures: 1",
            ]
        );
    }

    #[test]
    fn test_ready_and_rejections() {
        let mut p = proposal("5f2a9c01bbbb", 1, 1);
        p.actions.push(ProposalAction {
            copayer_id: "c9".to_string(),
            copayer_name: "Ana".to_string(),
            action_type: ActionType::Reject,
            comment: Some("too much".to_string()),
            signatures: Vec::new(),
        });

        let lines = render_proposals(&[p], Unit::Sat);
        assert_eq!(lines[0], "\tbbbb [\"rent\" by Drew] 150 sat => 1BoatSLRHtKNngkdXEeobR76b53LETtpyT");
        assert_eq!(lines[1], "\t\tActions: copayer0 ✓. Ana ✗ (too much)");
        assert_eq!(lines[2], "\t\tReady to broadcast");
    }

    #[test]
    fn test_no_actions_line_without_votes() {
        let mut p = proposal("cccc", 2, 0);
        p.message = None;
        let lines = render_proposals(&[p], Unit::Bit);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\tcccc [\"\" by Drew]"));
        assert_eq!(lines[1], "\t\tMissing signatures: 2");
    }

    #[test]
    fn test_empty_list() {
        assert!(render_proposals(&[], Unit::Bit).is_empty());
    }
}
