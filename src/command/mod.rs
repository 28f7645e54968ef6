pub mod key;
pub mod sorted_set;
pub mod string;

use crate::pool::ThreadPool;
use crate::protocol::{ErrorCode, Reply};
use crate::store::Store;

/// Route a parsed request to its handler. Verbs are ASCII
/// case-insensitive; every handler validates its arguments fully before
/// touching the store and emits exactly one reply token.
pub fn dispatch(args: &[Vec<u8>], store: &mut Store, pool: &ThreadPool) -> Reply {
    let Some(verb) = args.first() else {
        return Reply::error(ErrorCode::Arg, "empty command");
    };
    let verb = verb.to_ascii_lowercase();
    let args = &args[1..];
    match verb.as_slice() {
        b"get" => string::cmd_get(args, store),
        b"set" => string::cmd_set(args, store),
        b"del" => key::cmd_del(args, store, pool),
        b"keys" => key::cmd_keys(args, store),
        b"pexpire" => key::cmd_pexpire(args, store),
        b"pttl" => key::cmd_pttl(args, store),
        b"zadd" => sorted_set::cmd_zadd(args, store),
        b"zrem" => sorted_set::cmd_zrem(args, store),
        b"zscore" => sorted_set::cmd_zscore(args, store),
        b"zquery" => sorted_set::cmd_zquery(args, store),
        _ => Reply::error(ErrorCode::Unknown, "unknown command"),
    }
}

pub(crate) fn wrong_arg_count(cmd: &str) -> Reply {
    Reply::error(
        ErrorCode::Arg,
        format!("wrong number of arguments for '{cmd}' command"),
    )
}

pub(crate) fn wrong_type() -> Reply {
    Reply::error(ErrorCode::Type, "key holds the wrong kind of value")
}

/// Parse a score: any finite or infinite float, NaN rejected.
pub(crate) fn parse_score(arg: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(arg).ok()?;
    let score: f64 = text.parse().ok()?;
    if score.is_nan() {
        return None;
    }
    Some(score)
}

pub(crate) fn parse_int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}
