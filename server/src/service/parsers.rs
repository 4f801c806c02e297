//! Parsing functions from protobuf types to domain types

use quiz_proto::answer;
use tonic::Status;

/// Decode a submitted answer. Its shape is checked later, by grading.
pub fn parse_answer(answer: Option<quiz_proto::Answer>) -> Result<quiz::Answer, Status> {
    let value = answer
        .and_then(|a| a.value)
        .ok_or_else(|| Status::invalid_argument("Answer is required"))?;

    Ok(match value {
        answer::Value::Choice(index) => quiz::Answer::Choice(index as usize),
        answer::Value::Text(text) => quiz::Answer::Text(text),
        answer::Value::Pairs(pairs) => quiz::Answer::Pairs(
            pairs
                .pairs
                .into_iter()
                .map(|p| (p.left as usize, p.right as usize))
                .collect(),
        ),
    })
}

pub fn parse_user_id(user_id: &str) -> Result<&str, Status> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(Status::invalid_argument("User id is required"));
    }
    Ok(trimmed)
}

pub fn parse_session_id(session_id: &str) -> Result<&str, Status> {
    if session_id.is_empty() {
        return Err(Status::invalid_argument("Session id is required"));
    }
    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_proto::{MatchPair, MatchPairs};
    use tonic::Code;

    #[test]
    fn test_parse_answer_variants() {
        let choice = quiz_proto::Answer {
            value: Some(answer::Value::Choice(2)),
        };
        assert_eq!(parse_answer(Some(choice)).unwrap(), quiz::Answer::Choice(2));

        let pairs = quiz_proto::Answer {
            value: Some(answer::Value::Pairs(MatchPairs {
                pairs: vec![MatchPair { left: 0, right: 1 }, MatchPair { left: 1, right: 0 }],
            })),
        };
        assert_eq!(
            parse_answer(Some(pairs)).unwrap(),
            quiz::Answer::Pairs(vec![(0, 1), (1, 0)])
        );

        let text = quiz_proto::Answer {
            value: Some(answer::Value::Text(" Justice ".into())),
        };
        assert_eq!(
            parse_answer(Some(text)).unwrap(),
            quiz::Answer::Text(" Justice ".into())
        );
    }

    #[test]
    fn test_parse_answer_missing() {
        assert_eq!(parse_answer(None).unwrap_err().code(), Code::InvalidArgument);
        let empty = quiz_proto::Answer { value: None };
        assert_eq!(parse_answer(Some(empty)).unwrap_err().code(), Code::InvalidArgument);
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_user_id("  alice ").unwrap(), "alice");
        assert!(parse_user_id("   ").is_err());
        assert!(parse_session_id("").is_err());
        assert_eq!(parse_session_id("abc").unwrap(), "abc");
    }
}
