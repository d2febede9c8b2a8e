//! End-to-end exercise of the bridge primitives against an in-process
//! stand-in for a native library.
//!
//! The "library" here is a tally object with one method speaking the full
//! ABI: argument buffers lowered through the codec, an out-parameter call
//! status, a domain-error path, a panic path, and a subscription callback
//! dispatched back through the registry's raw entry point.

use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use gantry_runtime::abi::{gantry_buffer_free, CallbackEntryFn};
use gantry_runtime::registry::{dispatch_raw, CALLBACK_METHOD_FREE, CALLBACK_SUCCESS};
use gantry_runtime::{
    call_native, CallError, CallbackHandler, CallbackOutcome, CallbackRegistry, ForeignBufferFree,
    NativeCallStatus, NativeObject, PanicError, ProtocolError, CALL_DOMAIN_ERROR, CALL_PANIC,
};
use gantry_wire::{decode_value, encode_value, CodecError, WireBuffer, WireReader, WireWriter};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// ============================================================
// The fake native side
// ============================================================

struct Tally {
    total: AtomicU64,
    freed: Arc<AtomicUsize>,
}

impl Drop for Tally {
    fn drop(&mut self) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

fn new_tally(freed: Arc<AtomicUsize>) -> *mut c_void {
    Box::into_raw(Box::new(Tally {
        total: AtomicU64::new(0),
        freed,
    })) as *mut c_void
}

unsafe extern "C" fn tally_free(ptr: *mut c_void) {
    drop(Box::from_raw(ptr as *mut Tally));
}

/// `tally_add`: args carry an encoded u64 delta; the return buffer carries
/// the encoded new total. Delta 0 reports a domain error (variant 1); delta
/// 13 simulates a native panic with a message.
unsafe extern "C" fn tally_add(
    ptr: *mut c_void,
    args: WireBuffer,
    status: *mut NativeCallStatus,
) -> WireBuffer {
    // The native side consumes the argument buffer and returns it to the
    // allocator that created it.
    let bytes = args.as_slice().to_vec();
    gantry_buffer_free(args);

    let delta = match decode_value::<u64>(&bytes) {
        Ok(delta) => delta,
        Err(_) => {
            let payload = encode_value("malformed arguments").unwrap();
            (*status).set(CALL_PANIC, WireBuffer::from_vec(payload).unwrap());
            return WireBuffer::empty();
        }
    };

    if delta == 0 {
        let mut w = WireWriter::new();
        w.write_variant(1);
        (*status).set(CALL_DOMAIN_ERROR, w.into_buffer().unwrap());
        return WireBuffer::empty();
    }
    if delta == 13 {
        let payload = encode_value("tally overflowed its ledger").unwrap();
        (*status).set(CALL_PANIC, WireBuffer::from_vec(payload).unwrap());
        return WireBuffer::empty();
    }

    let tally = &*(ptr as *const Tally);
    let total = tally.total.fetch_add(delta, Ordering::SeqCst) + delta;
    let mut w = WireWriter::new();
    w.write_u64(total);
    w.into_buffer().unwrap()
}

/// Both sides of this test share the host allocator, so reclaiming a
/// "native" buffer is an `into_vec`.
struct HostAllocator;

impl ForeignBufferFree for HostAllocator {
    fn consume(&self, buf: WireBuffer) -> Result<Vec<u8>, ProtocolError> {
        if !buf.is_well_formed() {
            return Err(ProtocolError::MalformedBuffer);
        }
        Ok(unsafe { buf.into_vec() })
    }
}

// ============================================================
// The generated-wrapper side
// ============================================================

#[derive(Debug, PartialEq)]
enum TallyError {
    ZeroDelta,
}

impl gantry_wire::Decode for TallyError {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        match r.read_variant()? {
            1 => Ok(TallyError::ZeroDelta),
            tag => Err(CodecError::UnknownVariantTag {
                type_name: "TallyError",
                tag,
            }),
        }
    }
}

/// What a generated wrapper method looks like: acquire, lower, call,
/// check status, lift, release (via guard drop).
fn tally_add_wrapper(obj: &NativeObject, delta: u64) -> Result<u64, CallError<TallyError>> {
    let obj_ref = obj.acquire()?;
    let mut w = WireWriter::new();
    w.write_u64(delta);
    let args = w.into_buffer().expect("argument buffer");
    let out = call_native(&HostAllocator, |status| unsafe {
        tally_add(obj_ref.as_ptr(), args, status.as_mut_ptr())
    })?;
    let bytes = HostAllocator.consume(out)?;
    decode_value::<u64>(&bytes)
        .map_err(|e| CallError::Protocol(ProtocolError::MalformedPayload(e)))
}

// ============================================================
// Method calls through the status channel
// ============================================================

#[test]
fn wrapper_roundtrip_through_codec_and_status() {
    init_tracing();
    let freed = Arc::new(AtomicUsize::new(0));
    let obj = NativeObject::new(new_tally(Arc::clone(&freed)), tally_free);

    assert_eq!(tally_add_wrapper(&obj, 5).unwrap(), 5);
    assert_eq!(tally_add_wrapper(&obj, 7).unwrap(), 12);

    obj.destroy();
    assert_eq!(freed.load(Ordering::SeqCst), 1);
    drop(obj);
    assert_eq!(freed.load(Ordering::SeqCst), 1);
}

#[test]
fn domain_error_lifts_to_typed_error() {
    init_tracing();
    let freed = Arc::new(AtomicUsize::new(0));
    let obj = NativeObject::new(new_tally(Arc::clone(&freed)), tally_free);

    let err = tally_add_wrapper(&obj, 0).unwrap_err();
    assert!(matches!(err, CallError::Domain(TallyError::ZeroDelta)));

    // A domain error leaves the object fully usable.
    assert_eq!(tally_add_wrapper(&obj, 3).unwrap(), 3);
}

#[test]
fn native_panic_surfaces_with_message() {
    init_tracing();
    let freed = Arc::new(AtomicUsize::new(0));
    let obj = NativeObject::new(new_tally(Arc::clone(&freed)), tally_free);

    let err = tally_add_wrapper(&obj, 13).unwrap_err();
    match err {
        CallError::Panic(PanicError::Message(msg)) => {
            assert_eq!(msg, "tally overflowed its ledger");
        }
        other => panic!("expected native panic, got {other:?}"),
    }
}

#[test]
fn call_after_destroy_fails_without_touching_native_memory() {
    init_tracing();
    let freed = Arc::new(AtomicUsize::new(0));
    let obj = NativeObject::new(new_tally(Arc::clone(&freed)), tally_free);
    obj.destroy();
    assert_eq!(freed.load(Ordering::SeqCst), 1);

    let err = tally_add_wrapper(&obj, 1).unwrap_err();
    assert!(matches!(
        err,
        CallError::Protocol(ProtocolError::UseAfterDestroy)
    ));
}

#[test]
fn concurrent_wrapper_calls_share_one_object() {
    init_tracing();
    let freed = Arc::new(AtomicUsize::new(0));
    let obj = NativeObject::new(new_tally(Arc::clone(&freed)), tally_free);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..250 {
                    tally_add_wrapper(&obj, 2).unwrap();
                }
            });
        }
    });

    // 4 threads * 250 calls * delta 2; one more call reads the total.
    assert_eq!(tally_add_wrapper(&obj, 2).unwrap(), 2002);
    obj.destroy();
    assert_eq!(freed.load(Ordering::SeqCst), 1);
}

// ============================================================
// Callbacks: native code invoking Rust through the entry point
// ============================================================

struct EventSink {
    events: Mutex<Vec<String>>,
}

impl CallbackHandler for EventSink {
    fn interface_name(&self) -> &'static str {
        "EventSink"
    }

    fn invoke(&self, method: i32, args: &[u8]) -> CallbackOutcome {
        match method {
            1 => match decode_value::<String>(args) {
                Ok(event) => {
                    self.events.lock().unwrap().push(event);
                    CallbackOutcome::Success(Vec::new())
                }
                Err(e) => CallbackOutcome::Unexpected(e.to_string()),
            },
            other => CallbackOutcome::Unexpected(format!("unknown method {other}")),
        }
    }
}

// The entry point handed to native code must be a plain function, so the
// bindings that define it hold their registry in a static with explicit
// initialization.
static REGISTRY: OnceLock<CallbackRegistry> = OnceLock::new();

fn registry() -> &'static CallbackRegistry {
    REGISTRY.get_or_init(CallbackRegistry::new)
}

unsafe extern "C" fn callback_entry(
    handle: u64,
    method: i32,
    args: *const u8,
    args_len: i32,
    out: *mut WireBuffer,
) -> i32 {
    dispatch_raw(registry(), handle, method, args, args_len, out)
}

/// The native side's view of a subscription: the entry point address it
/// was given plus the numeric handle it holds.
struct FakeSubscription {
    entry: CallbackEntryFn,
    handle: u64,
}

impl FakeSubscription {
    fn emit(&self, event: &str) -> i32 {
        let args = encode_value(event).expect("event encoding");
        let mut out = WireBuffer::empty();
        let code = unsafe {
            (self.entry)(
                self.handle,
                1,
                args.as_ptr(),
                args.len() as i32,
                &mut out,
            )
        };
        // Native code frees the result buffer through the side that
        // allocated it.
        unsafe { gantry_buffer_free(out) };
        code
    }

    fn release(&self) -> i32 {
        let mut out = WireBuffer::empty();
        let code = unsafe {
            (self.entry)(
                self.handle,
                CALLBACK_METHOD_FREE,
                std::ptr::null(),
                0,
                &mut out,
            )
        };
        unsafe { gantry_buffer_free(out) };
        code
    }
}

#[test]
fn native_invokes_callback_and_releases_it() {
    init_tracing();
    let sink = Arc::new(EventSink {
        events: Mutex::new(Vec::new()),
    });
    let handler: Arc<dyn CallbackHandler> = sink.clone();
    let handle = registry().register(Arc::clone(&handler));

    // Registration is idempotent on the same instance.
    assert_eq!(registry().register(handler), handle);

    let subscription = FakeSubscription {
        entry: callback_entry,
        handle,
    };

    assert_eq!(subscription.emit("peer joined"), CALLBACK_SUCCESS);
    assert_eq!(subscription.emit("peer left"), CALLBACK_SUCCESS);
    assert_eq!(
        *sink.events.lock().unwrap(),
        vec!["peer joined".to_string(), "peer left".to_string()]
    );

    assert_eq!(subscription.release(), CALLBACK_SUCCESS);
    assert!(registry().get(handle).is_none());

    // Releasing again is a no-op on the native side's retry.
    assert_eq!(subscription.release(), CALLBACK_SUCCESS);
}
