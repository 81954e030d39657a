//! Quota Context - 请求预留量
//!
//! 预留量是一个请求可能消耗的 token 上界，在生成前按调用次数和输入大小算出。
//! 提示词 token 数不超过其 UTF-8 字节数，补全 token 数不超过 max_tokens

/// 预留量估算参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// 单次调用的补全上限
    pub completion_tokens: u64,
    /// 系统指令与提示词模板的固定开销
    pub prompt_overhead_tokens: u64,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            completion_tokens: 4096,
            prompt_overhead_tokens: 2048,
        }
    }
}

/// 一个请求的模型调用形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPlan {
    /// 最多调用次数
    pub calls: u32,
    /// 每次调用的提示词最多带入几份前序调用的输出
    pub carried_outputs: u32,
}

impl CallPlan {
    pub fn single() -> Self {
        Self {
            calls: 1,
            carried_outputs: 0,
        }
    }

    /// 编辑-评审循环: 每轮一次编辑一次评审，提示词带入上一轮的正文和反馈
    pub fn editor_critic(max_iterations: u32) -> Self {
        Self {
            calls: max_iterations.saturating_mul(2),
            carried_outputs: 2,
        }
    }
}

impl ReservationPolicy {
    pub fn new(completion_tokens: u64, prompt_overhead_tokens: u64) -> Self {
        Self {
            completion_tokens,
            prompt_overhead_tokens,
        }
    }

    /// 单次调用的用量上界
    pub fn per_call(&self, input_bytes: usize, carried_outputs: u32) -> u64 {
        let carried = self.completion_tokens.saturating_mul(u64::from(carried_outputs));
        (input_bytes as u64)
            .saturating_add(self.prompt_overhead_tokens)
            .saturating_add(carried)
            .saturating_add(self.completion_tokens)
    }

    /// 整个请求的用量上界
    pub fn reserve(&self, plan: CallPlan, input_bytes: usize) -> u64 {
        self.per_call(input_bytes, plan.carried_outputs)
            .saturating_mul(u64::from(plan.calls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_call_bound() {
        let policy = ReservationPolicy::new(100, 20);
        assert_eq!(policy.reserve(CallPlan::single(), 50), 170);
    }

    #[test]
    fn test_loop_bound_scales_with_iterations() {
        let policy = ReservationPolicy::new(100, 20);
        let one = policy.reserve(CallPlan::editor_critic(1), 50);
        let three = policy.reserve(CallPlan::editor_critic(3), 50);

        // 每次调用: 50 + 20 + 2*100 + 100
        assert_eq!(one, 2 * 370);
        assert_eq!(three, 3 * one);
    }

    #[test]
    fn test_bound_saturates() {
        let policy = ReservationPolicy::new(u64::MAX, 1);
        assert_eq!(policy.reserve(CallPlan::editor_critic(10), 10), u64::MAX);
    }
}
