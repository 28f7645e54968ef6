use crate::command::{parse_int, parse_score, wrong_arg_count, wrong_type};
use crate::protocol::{ErrorCode, Reply};
use crate::store::entry::Entry;
use crate::store::Store;
use crate::types::{SortedSet, Value};

/// Resolve a key to its sorted set: `Ok(None)` when the key is absent,
/// `Err(reply)` when it holds the wrong kind.
fn expect_zset<'a>(store: &'a mut Store, key: &[u8]) -> Result<Option<&'a mut SortedSet>, Reply> {
    match store.get_mut(key) {
        None => Ok(None),
        Some(entry) => match &mut entry.value {
            Value::SortedSet(set) => Ok(Some(set)),
            Value::String(_) => Err(wrong_type()),
        },
    }
}

pub fn cmd_zadd(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 3 {
        return wrong_arg_count("zadd");
    }
    let Some(score) = parse_score(&args[1]) else {
        return Reply::error(ErrorCode::Arg, "score is not a valid number");
    };
    if store.get(&args[0]).is_none() {
        let mut set = SortedSet::new();
        set.add(&args[2], score);
        store.insert(args[0].clone(), Entry::new(Value::SortedSet(set)));
        return Reply::Integer(1);
    }
    match expect_zset(store, &args[0]) {
        Err(reply) => reply,
        Ok(Some(set)) => Reply::Integer(i64::from(set.add(&args[2], score))),
        Ok(None) => unreachable!("checked above"),
    }
}

pub fn cmd_zrem(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 2 {
        return wrong_arg_count("zrem");
    }
    match expect_zset(store, &args[0]) {
        Err(reply) => reply,
        Ok(None) => Reply::Integer(0),
        Ok(Some(set)) => Reply::Integer(i64::from(set.remove(&args[1]))),
    }
}

pub fn cmd_zscore(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 2 {
        return wrong_arg_count("zscore");
    }
    match expect_zset(store, &args[0]) {
        Err(reply) => reply,
        Ok(None) => Reply::Nil,
        Ok(Some(set)) => match set.score(&args[1]) {
            Some(score) => Reply::Double(score),
            None => Reply::Nil,
        },
    }
}

pub fn cmd_zquery(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 5 {
        return wrong_arg_count("zquery");
    }
    let Some(score) = parse_score(&args[1]) else {
        return Reply::error(ErrorCode::Arg, "score is not a valid number");
    };
    let (Some(offset), Some(limit)) = (parse_int(&args[3]), parse_int(&args[4])) else {
        return Reply::error(ErrorCode::Arg, "offset or limit is not an integer");
    };
    match expect_zset(store, &args[0]) {
        Err(reply) => reply,
        Ok(None) => Reply::Array(Vec::new()),
        Ok(Some(set)) => {
            let members = set.query(score, &args[2], offset, limit);
            let mut out = Vec::with_capacity(members.len() * 2);
            for (name, score) in members {
                out.push(Reply::String(name));
                out.push(Reply::Double(score));
            }
            Reply::Array(out)
        }
    }
}
