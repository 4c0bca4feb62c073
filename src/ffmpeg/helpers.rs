//! Safe wrappers around FFmpeg FFI calls.
//!
//! All `unsafe` blocks needed for routine FFmpeg access live here with
//! their safety arguments; callers outside this module never need one.

use ffmpeg_next as ffmpeg;

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `bit_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor. Demuxers
/// leave it at 0 when the container carries no bitrate.
pub fn codec_params_bit_rate(params: &ffmpeg::codec::parameters::Parameters) -> i64 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`.  `bit_rate` is a plain i64 field with no
    // ownership semantics.
    unsafe { (*params.as_ptr()).bit_rate }
}

/// Allocate a fresh `AVCodecParameters`, copy the encoder context into it,
/// and return it as a safe `ffmpeg::codec::Parameters`.
///
/// Used to describe the encoded stream to the output muxer.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_alloc` only fails under OOM.
    // `avcodec_parameters_from_context` copies fields from a valid, open
    // encoder context; `ctx.as_ptr()` is non-null while `encoder` is alive.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

// ── FLTP audio plane reinterpretation ───────────────────────────────────────

/// Reinterpret a raw byte slice from an FLTP audio plane as `&[f32]`.
///
/// Returns `None` if the pointer is not 4-byte aligned or the slice holds
/// fewer than `sample_count` floats.
pub fn fltp_plane_as_f32(byte_slice: &[u8], sample_count: usize) -> Option<&[f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: alignment and length are verified above.  FLTP planes are
    // native-endian f32 values laid out contiguously.
    Some(unsafe { std::slice::from_raw_parts(ptr as *const f32, sample_count) })
}

/// Mutable version of [`fltp_plane_as_f32`].
pub fn fltp_plane_as_f32_mut(byte_slice: &mut [u8], sample_count: usize) -> Option<&mut [f32]> {
    let expected_bytes = sample_count.checked_mul(4)?;
    if byte_slice.len() < expected_bytes {
        return None;
    }
    let ptr = byte_slice.as_mut_ptr();
    if (ptr as usize) % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: as above; the mutable borrow of `byte_slice` is exclusive.
    Some(unsafe { std::slice::from_raw_parts_mut(ptr as *mut f32, sample_count) })
}

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around `ffmpeg-next`'s `Audio::data(index)` which stops counting
/// planes when `linesize[1] == 0`; planar audio frames usually only populate
/// `linesize[0]` for every plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    // SAFETY: `frame.as_ptr()` is valid for the lifetime of `frame`; plane
    // pointers are checked for null and sized by `linesize[0]`.
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &[];
            }
        } else if index > 0 {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of [`audio_plane_data`].
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    // SAFETY: same as `audio_plane_data`; `frame` is borrowed mutably.
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &mut [];
            }
        } else if index > 0 {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

/// Returns `true` if an encoder named `name` is registered.
pub fn encoder_exists(name: &str) -> bool {
    ffmpeg::codec::encoder::find_by_name(name).is_some()
}
