use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

use super::handle::{FruHandle, FruRecordOps};

/// Interprets raw FRU inventory bytes as a concrete record type.
///
/// Decoders are tried in registration order; the first one to succeed wins
/// and its record/op-table pair is attached to the handle. Order is
/// therefore semantically significant for overlapping formats.
pub trait FruDecoder: Send + Sync {
    fn name(&self) -> &'static str;
    fn decode(&self, data: &[u8]) -> Result<(Arc<dyn Any + Send + Sync>, Arc<dyn FruRecordOps>)>;
}

pub struct FruDecoderRegistry {
    decoders: Mutex<Vec<Arc<dyn FruDecoder>>>,
}

impl FruDecoderRegistry {
    pub fn new() -> Self {
        FruDecoderRegistry {
            decoders: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, decoder: Arc<dyn FruDecoder>) {
        self.decoders.lock().unwrap().push(decoder);
    }

    pub fn deregister(&self, name: &str) {
        self.decoders.lock().unwrap().retain(|d| d.name() != name);
    }

    /// Runs the registered decoders in order against `handle`'s fetched
    /// data, attaching the first one that succeeds.
    pub fn decode(&self, handle: &FruHandle) -> Result<()> {
        let decoders = self.decoders.lock().unwrap().clone();
        let data = handle.data_snapshot();

        let mut last_err = Error::Unsupported("no FRU decoders registered");
        for decoder in &decoders {
            match decoder.decode(&data) {
                Ok((record, ops)) => {
                    handle.attach_record(record, ops);
                    return Ok(());
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fru::FruIdentity;

    struct TagRecord(&'static str);
    struct TagOps;
    impl FruRecordOps for TagOps {
        fn write(&self, _handle: &FruHandle) -> Result<()> {
            Ok(())
        }
    }

    struct AlwaysFails;
    impl FruDecoder for AlwaysFails {
        fn name(&self) -> &'static str {
            "always_fails"
        }
        fn decode(&self, _data: &[u8]) -> Result<(Arc<dyn Any + Send + Sync>, Arc<dyn FruRecordOps>)> {
            Err(Error::Unsupported("never matches"))
        }
    }

    struct TaggingDecoder(&'static str);
    impl FruDecoder for TaggingDecoder {
        fn name(&self) -> &'static str {
            self.0
        }
        fn decode(&self, _data: &[u8]) -> Result<(Arc<dyn Any + Send + Sync>, Arc<dyn FruRecordOps>)> {
            Ok((Arc::new(TagRecord(self.0)), Arc::new(TagOps)))
        }
    }

    fn handle_with_data() -> Arc<FruHandle> {
        let handle = FruHandle::new(FruIdentity {
            channel: 0,
            device_address: 0x20,
            device_id: 0,
            lun: 0,
        });
        handle.begin_read(vec![0u8; 8], false);
        handle
    }

    #[test]
    fn first_registered_decoder_wins_when_both_would_accept() {
        let registry = FruDecoderRegistry::new();
        registry.register(Arc::new(TaggingDecoder("first")));
        registry.register(Arc::new(TaggingDecoder("second")));

        let handle = handle_with_data();
        registry.decode(&handle).unwrap();
        assert_eq!(handle.record::<TagRecord>().unwrap().0, "first");
    }

    #[test]
    fn skips_decoders_that_fail_to_match() {
        let registry = FruDecoderRegistry::new();
        registry.register(Arc::new(AlwaysFails));
        registry.register(Arc::new(TaggingDecoder("fallback")));

        let handle = handle_with_data();
        registry.decode(&handle).unwrap();
        assert_eq!(handle.record::<TagRecord>().unwrap().0, "fallback");
    }

    #[test]
    fn surfaces_last_error_when_nothing_matches() {
        let registry = FruDecoderRegistry::new();
        registry.register(Arc::new(AlwaysFails));

        let handle = handle_with_data();
        let err = registry.decode(&handle).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
