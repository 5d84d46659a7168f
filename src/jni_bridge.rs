//! JNI Bridge - Kotlin/Java bindings for the native image functions
//!
//! All functions follow the JNI naming convention: Java_<package>_<class>_<method>
//! and are `native` instance methods of `com.flam.rnd.MainActivity`.
//! Every body runs inside [`guard`], so failures come back as `false`,
//! a `0` handle or an error string, never as a crash.

use jni::objects::{JByteArray, JObject, JString};
use jni::sys::{jboolean, jbyte, jint, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;

use crate::bridge;
use crate::error::{guard, Result};
use crate::handle_registry::NULL_HANDLE;
use crate::image_engine::try_zeroed;
use crate::yuv_engine::YuvPlanes;

fn to_jboolean(result: Result<()>) -> Result<jboolean> {
    result.map(|_| JNI_TRUE)
}

fn error_json(e: &dyn std::fmt::Display) -> String {
    serde_json::json!({ "error": e.to_string() }).to_string()
}

/// Initialize logging
/// JNI: MainActivity.init()
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_init(_env: JNIEnv, _this: JObject) {
    guard("init", (), || {
        crate::init_library(&bridge::global().config());
        Ok(())
    })
}

/// Replace the bridge configuration
/// JNI: MainActivity.configure(configJson: String): Boolean
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_configure<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    config_json: JString<'local>,
) -> jboolean {
    guard("configure", JNI_FALSE, || {
        let json: String = env.get_string(&config_json)?.into();
        to_jboolean(bridge::global().configure(&json))
    })
}

/// JNI: MainActivity.stringFromJNI(): String
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_stringFromJNI<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
) -> jstring {
    guard("stringFromJNI", std::ptr::null_mut(), || {
        log::info!("native function called successfully");
        Ok(env.new_string("Hello from Rust NDK!")?.into_raw())
    })
}

/// Version of the vision library, `major * 10000 + minor * 100 + patch`, or 0
/// JNI: MainActivity.getVisionLibraryVersion(): Int
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_getVisionLibraryVersion(
    _env: JNIEnv,
    _this: JObject,
) -> jint {
    guard("getVisionLibraryVersion", 0, || {
        let backend = bridge::global().backend();
        match backend.version() {
            Some(version) => {
                log::info!("{} version: {}", backend.name(), version.encoded());
                Ok(version.encoded())
            }
            None => {
                log::info!("vision library not configured");
                Ok(0)
            }
        }
    })
}

/// JNI: MainActivity.getNativeInfo(): String
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_getNativeInfo<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
) -> jstring {
    guard("getNativeInfo", std::ptr::null_mut(), || {
        let bridge = bridge::global();
        let info = format!(
            "Native Info:\n- Architecture: {}\n- OS: {}\n- Library: {}\n- Backend: {}\n- Live buffers: {}\n",
            std::env::consts::ARCH,
            std::env::consts::OS,
            crate::VERSION,
            bridge.backend().name(),
            bridge.live_buffers(),
        );
        log::info!("native info requested: {}", info);
        Ok(env.new_string(&info)?.into_raw())
    })
}

// ============================================================================
// Buffer lifecycle
// ============================================================================

/// Allocate a native image buffer
/// JNI: MainActivity.createBuffer(width: Int, height: Int, type: Int): Long (0 on failure)
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_createBuffer(
    _env: JNIEnv,
    _this: JObject,
    width: jint,
    height: jint,
    format: jint,
) -> jlong {
    guard("createBuffer", NULL_HANDLE as jlong, || {
        Ok(bridge::global().create_buffer(width, height, format)? as jlong)
    })
}

/// JNI: MainActivity.releaseBuffer(handle: Long)
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_releaseBuffer(
    _env: JNIEnv,
    _this: JObject,
    handle: jlong,
) {
    guard("releaseBuffer", (), || bridge::global().release_buffer(handle as u64))
}

/// JNI: MainActivity.getBufferInfo(handle: Long): String (JSON)
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_getBufferInfo<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
) -> jstring {
    guard("getBufferInfo", std::ptr::null_mut(), || {
        let json = bridge::global()
            .buffer_info(handle as u64)
            .and_then(|info| Ok(serde_json::to_string(&info)?))
            .unwrap_or_else(|e| {
                log::error!("getBufferInfo failed: {}", e);
                error_json(&e)
            });
        Ok(env.new_string(&json)?.into_raw())
    })
}

// ============================================================================
// Processing
// ============================================================================

/// Grayscale + Canny edges, in place
/// JNI: MainActivity.processGrayscaleEdges(handle: Long): Boolean
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_processGrayscaleEdges(
    _env: JNIEnv,
    _this: JObject,
    handle: jlong,
) -> jboolean {
    guard("processGrayscaleEdges", JNI_FALSE, || {
        to_jboolean(bridge::global().process_grayscale_edges(handle as u64))
    })
}

/// Grayscale + Gaussian blur, in place
/// JNI: MainActivity.processGrayscaleBlur(handle: Long): Boolean
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_processGrayscaleBlur(
    _env: JNIEnv,
    _this: JObject,
    handle: jlong,
) -> jboolean {
    guard("processGrayscaleBlur", JNI_FALSE, || {
        to_jboolean(bridge::global().process_grayscale_blur(handle as u64))
    })
}

/// Camera planes to a new RGBA buffer
/// JNI: MainActivity.convertYuvToRgba(y: ByteArray, u: ByteArray, v: ByteArray,
///                                    width: Int, height: Int,
///                                    yStride: Int, uvStride: Int): Long (0 on failure)
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "system" fn Java_com_flam_rnd_MainActivity_convertYuvToRgba<'local>(
    env: JNIEnv<'local>,
    _this: JObject<'local>,
    y_plane: JByteArray<'local>,
    u_plane: JByteArray<'local>,
    v_plane: JByteArray<'local>,
    width: jint,
    height: jint,
    y_stride: jint,
    uv_stride: jint,
) -> jlong {
    guard("convertYuvToRgba", NULL_HANDLE as jlong, || {
        let y = env.convert_byte_array(&y_plane)?;
        let u = env.convert_byte_array(&u_plane)?;
        let v = env.convert_byte_array(&v_plane)?;

        let planes = YuvPlanes {
            y: &y,
            u: &u,
            v: &v,
            width,
            height,
            y_stride,
            uv_stride,
        };
        Ok(bridge::global().convert_yuv_to_rgba(&planes)? as jlong)
    })
}

// ============================================================================
// Marshalling
// ============================================================================

/// Copy a buffer out as packed RGBA
/// JNI: MainActivity.copyBufferAsRgbaBytes(handle: Long, out: ByteArray,
///                                         width: Int, height: Int): Boolean
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_copyBufferAsRgbaBytes<'local>(
    env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    out: JByteArray<'local>,
    width: jint,
    height: jint,
) -> jboolean {
    guard("copyBufferAsRgbaBytes", JNI_FALSE, || {
        let out_len = env.get_array_length(&out)?.max(0) as usize;
        // Stage no more than the copy needs; the bridge rejects a short destination
        let needed = (width.max(0) as usize)
            .saturating_mul(height.max(0) as usize)
            .saturating_mul(4);
        let mut staging = try_zeroed(out_len.min(needed))?;

        let written = bridge::global().copy_as_rgba(handle as u64, &mut staging, width, height)?;

        let signed: Vec<jbyte> = staging[..written].iter().map(|&b| b as jbyte).collect();
        env.set_byte_array_region(&out, 0, &signed)?;
        Ok(JNI_TRUE)
    })
}

/// Fill a buffer from tightly packed rows
/// JNI: MainActivity.writeBufferBytes(handle: Long, data: ByteArray): Boolean
#[no_mangle]
pub extern "system" fn Java_com_flam_rnd_MainActivity_writeBufferBytes<'local>(
    env: JNIEnv<'local>,
    _this: JObject<'local>,
    handle: jlong,
    data: JByteArray<'local>,
) -> jboolean {
    guard("writeBufferBytes", JNI_FALSE, || {
        let bytes = env.convert_byte_array(&data)?;
        bridge::global().write_bytes(handle as u64, &bytes)?;
        Ok(JNI_TRUE)
    })
}
