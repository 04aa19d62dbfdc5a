//! Hardware H.264 encoder probe through Media Foundation.

use std::ffi::c_void;

use tracing::{debug, trace};
use windows::Win32::Media::MediaFoundation::{
    IMFActivate, MFMediaType_Video, MFTEnumEx, MFVideoFormat_H264, MFT_CATEGORY_VIDEO_ENCODER,
    MFT_ENUM_FLAG_HARDWARE, MFT_ENUM_FLAG_SORTANDFILTER, MFT_REGISTER_TYPE_INFO,
};
use windows::Win32::System::Com::CoTaskMemFree;

use vdisplay_pump::EncoderInfo;

/// Look for hardware transforms producing H.264.
///
/// Returns `None` when the enumeration fails or finds nothing.
pub fn probe_h264_encoder() -> Option<EncoderInfo> {
    let output = MFT_REGISTER_TYPE_INFO {
        guidMajorType: MFMediaType_Video,
        guidSubtype: MFVideoFormat_H264,
    };

    let mut activates: *mut Option<IMFActivate> = std::ptr::null_mut();
    let mut count = 0u32;

    let result = unsafe {
        MFTEnumEx(
            MFT_CATEGORY_VIDEO_ENCODER,
            MFT_ENUM_FLAG_HARDWARE | MFT_ENUM_FLAG_SORTANDFILTER,
            None,
            Some(&output as *const MFT_REGISTER_TYPE_INFO),
            &mut activates,
            &mut count,
        )
    };

    if !activates.is_null() {
        // Release every activation object before freeing the array.
        unsafe {
            for i in 0..count as usize {
                drop(activates.add(i).read());
            }
            CoTaskMemFree(Some(activates as *const c_void));
        }
    }

    match result {
        Ok(()) if count > 0 => Some(EncoderInfo {
            codec: "H264".to_string(),
            hardware_transforms: count,
        }),
        Ok(()) => {
            debug!("No hardware H.264 encoder found");
            None
        }
        Err(e) => {
            trace!("MFTEnumEx failed: {}", e);
            None
        }
    }
}
