use actlet::Action;
use actlet::Message;
use actlet::Signal;
use static_assertions::assert_impl_all;
use static_assertions::assert_not_impl_any;
use static_assertions::assert_type_eq_all;

#[derive(Message)]
struct Tick;
assert_impl_all!(Tick: Message, Signal);
assert_not_impl_any!(Tick: Action);
assert_type_eq_all!(<Tick as Message>::Reply, ());

#[derive(Message)]
#[reply()]
struct Flush;
assert_impl_all!(Flush: Message, Action);
assert_type_eq_all!(<Flush as Message>::Reply, ());

#[derive(Message)]
#[reply("usize")]
struct Count;
assert_impl_all!(Count: Message, Action);
assert_type_eq_all!(<Count as Message>::Reply, usize);

#[derive(Message)]
#[reply(Vec<String>)]
struct Names;
assert_impl_all!(Names: Message, Action);
assert_type_eq_all!(<Names as Message>::Reply, Vec<String>);

#[derive(Message)]
#[reply("Result<u64, String>")]
struct Lookup<T: Send>(T);
assert_impl_all!(Lookup<u8>: Message, Action);
assert_type_eq_all!(<Lookup<u8> as Message>::Reply, Result<u64, String>);
