use crate::command::{parse_int, wrong_arg_count};
use crate::pool::ThreadPool;
use crate::protocol::{ErrorCode, Reply};
use crate::store::entry::{self, mono_now_us};
use crate::store::Store;

pub fn cmd_del(args: &[Vec<u8>], store: &mut Store, pool: &ThreadPool) -> Reply {
    if args.len() != 1 {
        return wrong_arg_count("del");
    }
    match store.remove(&args[0]) {
        Some(removed) => {
            entry::dispose(removed, pool);
            Reply::Integer(1)
        }
        None => Reply::Integer(0),
    }
}

pub fn cmd_keys(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if !args.is_empty() {
        return wrong_arg_count("keys");
    }
    Reply::Array(store.keys().into_iter().map(Reply::String).collect())
}

pub fn cmd_pexpire(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 2 {
        return wrong_arg_count("pexpire");
    }
    let Some(ttl_ms) = parse_int(&args[1]) else {
        return Reply::error(ErrorCode::Arg, "TTL is not an integer");
    };
    if store.set_ttl(&args[0], ttl_ms, mono_now_us()) {
        Reply::Integer(1)
    } else {
        Reply::Integer(0)
    }
}

pub fn cmd_pttl(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.len() != 1 {
        return wrong_arg_count("pttl");
    }
    Reply::Integer(store.pttl(&args[0], mono_now_us()))
}
