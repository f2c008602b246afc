pub mod goodsync;

pub use goodsync::GoodSyncModule;
