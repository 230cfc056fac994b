//! Command handlers for the fake server
//!
//! Read-only commands get a snapshot of the account; commands that
//! change state get the shared `Mutex<Mailbox>` and hold the lock only
//! while mutating, never across an `.await`.

mod copy;
mod fetch;
mod session;

pub use copy::handle_uid_copy;
pub use expunge::handle_expunge;
pub use fetch::handle_uid_fetch;
pub use folders::{handle_list, handle_select};
pub use search::handle_uid_search;
pub use session::{handle_login, handle_logout};
pub use store::{StoreArgs, handle_uid_store};

use super::io::complete;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// UIDs named by a sequence set; `*` stands for `max_uid`.
pub fn uids_in(set: &SequenceSet, max_uid: u32) -> Vec<u32> {
    let bound = |v: &SeqOrUid| match v {
        SeqOrUid::Value(n) => n.get(),
        SeqOrUid::Asterisk => max_uid,
    };
    set.0
        .as_ref()
        .iter()
        .flat_map(|seq| match seq {
            Sequence::Single(v) => {
                let uid = bound(v);
                uid..=uid
            }
            Sequence::Range(a, b) => {
                let (a, b) = (bound(a), bound(b));
                a.min(b)..=a.max(b)
            }
        })
        .collect()
}

/// Reply BAD when no mailbox is selected.
async fn require_selected<'a, S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    selected: Option<&'a str>,
    stream: &mut BufReader<S>,
) -> Option<&'a str> {
    if selected.is_none() {
        complete(stream, tag, "BAD No mailbox selected").await;
    }
    selected
}

#[cfg(test)]
pub fn uid_set(uids: &[u32]) -> SequenceSet {
    use std::num::NonZeroU32;
    let seqs: Vec<Sequence> = uids
        .iter()
        .map(|&uid| Sequence::Single(SeqOrUid::Value(NonZeroU32::new(uid).unwrap())))
        .collect();
    SequenceSet(seqs.try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    #[test]
    fn singles_and_ranges() {
        assert_eq!(uids_in(&uid_set(&[3, 7]), 10), vec![3, 7]);

        let range = SequenceSet(
            vec![Sequence::Range(
                SeqOrUid::Value(NonZeroU32::new(2).unwrap()),
                SeqOrUid::Asterisk,
            )]
            .try_into()
            .unwrap(),
        );
        assert_eq!(uids_in(&range, 4), vec![2, 3, 4]);
    }
}
